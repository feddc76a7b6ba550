use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

pub fn init(debug_enabled: bool) {
    let level = if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("shelf")
        .build();
    let _ = TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto);
}
