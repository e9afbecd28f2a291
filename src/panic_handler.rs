use log::error;
use std::panic;

/// Install the panic hooks.
///
/// Debug builds get `better-panic` backtraces, release builds the
/// `human-panic` crash report. Either way the panic is also written to the
/// log, which may be a file the user never sees on the terminal.
pub fn initialize_panic_handler() {
    #[cfg(debug_assertions)]
    better_panic::install();

    #[cfg(not(debug_assertions))]
    human_panic::setup_panic!();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("{panic_info}");
        log::logger().flush();

        default_hook(panic_info);
    }));
}
