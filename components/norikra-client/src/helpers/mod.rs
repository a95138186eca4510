pub mod converters;
pub mod load_config;
pub mod time_format;
