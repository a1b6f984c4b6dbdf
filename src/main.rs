use std::process::ExitCode;

mod app;
mod cli;
mod config;
mod lock;
mod logger;
mod mirror;
mod notifier;
mod session;
mod tracker;

fn main() -> ExitCode {
    app::main()
}
