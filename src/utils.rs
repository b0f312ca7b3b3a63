use pretty_env_logger::formatted_builder;

/// Installs a `pretty_env_logger` logger filtered by `RUST_LOG`, `info` by default
pub fn init_logger() -> Result<(), log::SetLoggerError> {
    let mut builder = formatted_builder();

    if let Ok(s) = ::std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else {
        builder.parse_filters("info");
    }

    builder.try_init()
}
