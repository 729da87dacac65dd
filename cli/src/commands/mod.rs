mod day;
mod helpers;
mod history;
mod settings;
mod transfer;

pub(crate) use day::{
    cmd_day_copy, cmd_day_delete, cmd_day_done, cmd_day_reset, cmd_day_set, cmd_day_show,
    cmd_day_target,
};
pub(crate) use history::{cmd_calendar, cmd_history};
pub(crate) use settings::{cmd_settings_range, cmd_settings_show, cmd_settings_target};
pub(crate) use transfer::{cmd_backups, cmd_export, cmd_import};
