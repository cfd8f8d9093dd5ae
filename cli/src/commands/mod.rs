pub(crate) mod arsc;
pub(crate) mod axml;
pub(crate) mod list;
pub(crate) mod path_helpers;
pub(crate) mod show;

pub(crate) use arsc::command_arsc;
pub(crate) use axml::command_axml;
pub(crate) use list::command_list;
pub(crate) use show::command_show;
