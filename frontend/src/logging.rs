use log::Level;

/// Route `log` records to the browser console. Repeat calls are ignored.
pub fn init_logging() {
    if console_log::init_with_level(Level::Info).is_err() {
        log::debug!("console logger already installed");
    }
}
