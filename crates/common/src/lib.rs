mod env;
mod time;

pub use env::{EnvVars, env_or};
pub use time::{
    taipei_now, taipei_today, format_draw_time, format_file_stamp,
    DRAW_TIME_FORMAT, DATE_FORMAT, FILE_STAMP_FORMAT,
};

