use log::{LevelFilter, SetLoggerError};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{runtime::ConfigErrors, Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

/// Error raised while installing the console logger.
#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("invalid logger configuration: {0}")]
    Config(#[from] ConfigErrors),

    #[error(transparent)]
    SetLogger(#[from] SetLoggerError),
}

/// Install a stderr logger at `level` and log panics through it.
///
/// Stdout is left to the command line output.
pub fn init_log(level: LevelFilter) -> Result<(), LoggerError> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{h({l})} - {f}:{L}] {m}{n}")))
        .build();
    let appender = Appender::builder().build("stderr", Box::new(stderr));

    let config = Config::builder()
        .appender(appender)
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    update_panic_hook();

    Ok(())
}

fn update_panic_hook() {
    let hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC => {info}");
        hook(info);
    }));
}
