use log::LevelFilter;

pub use log::LevelFilter::*;

#[cfg(feature = "screeps")]
struct JsLog;

#[cfg(feature = "screeps")]
impl log::Log for JsLog {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        web_sys::console::log_1(&js_sys::JsString::from(format!("{}", record.args())).into());
    }

    fn flush(&self) {}
}

fn format(out: fern::FormatCallback<'_>, message: &std::fmt::Arguments<'_>, record: &log::Record<'_>) {
    out.finish(format_args!("({}) {}: {}", record.level(), record.target(), message))
}

/// Installs the global logger. Records are filtered by `log`'s max level so
/// verbosity can be changed at runtime with `set_verbosity`.
pub fn setup_logging(verbosity: LevelFilter) {
    let dispatch = fern::Dispatch::new().level(LevelFilter::Trace).format(format);

    #[cfg(feature = "screeps")]
    let dispatch = dispatch.chain(Box::new(JsLog) as Box<dyn log::Log>);

    #[cfg(not(feature = "screeps"))]
    let dispatch = dispatch.chain(std::io::stdout());

    if let Err(err) = dispatch.apply() {
        log::debug!("Logger already installed: {}", err);
    }

    set_verbosity(verbosity);
}

pub fn set_verbosity(verbosity: LevelFilter) {
    log::set_max_level(verbosity);
}
