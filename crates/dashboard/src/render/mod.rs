pub(crate) mod html;
pub(crate) mod tables;
pub(crate) mod text;

pub(crate) use tables::TextTable;
