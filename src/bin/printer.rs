//! Test fixture: prints a message a number of times after an optional sleep.
//! The end-to-end tests run this binary through the server to get predictable
//! output and timing.

use clap::Parser;

#[derive(Parser)]
#[command(name = "printer")]
struct Cli {
    /// Message to print.
    #[arg(long, default_value = "hello")]
    message: String,

    /// Number of times to print the message.
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Milliseconds to sleep before printing.
    #[arg(long, default_value_t = 0)]
    sleep: u64,
}

fn main() {
    let cli = Cli::parse();

    if cli.sleep > 0 {
        std::thread::sleep(std::time::Duration::from_millis(cli.sleep));
    }

    for _ in 0..cli.repeat {
        println!("{}", cli.message);
    }
}
