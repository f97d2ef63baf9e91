use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use task_server::model::{TaskRequest, TaskResult};

#[derive(Parser)]
#[command(name = "task-cli")]
#[command(about = "Send one task to a task-server and print the result", long_about = None)]
struct Cli {
    /// Server address to connect to.
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    address: String,

    /// Task timeout in milliseconds (0 = unbounded).
    #[arg(short, long, default_value_t = 0)]
    timeout: u64,

    /// Command to run, e.g. `task-cli -- echo hello`.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let request = TaskRequest {
        command: cli.command,
        timeout: cli.timeout,
    };
    let mut payload = serde_json::to_vec(&request)?;
    payload.push(b'\n');

    let mut stream = TcpStream::connect(&cli.address).await?;
    stream.write_all(&payload).await?;

    // Responses carry no trailing newline: accumulate until the buffer holds
    // one complete JSON document or the server closes the connection.
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if serde_json::from_slice::<TaskResult>(&buf).is_ok() {
            break;
        }
    }

    match serde_json::from_slice::<TaskResult>(&buf) {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        // Malformed requests are answered in plain text; pass that through
        Err(_) => eprintln!("{}", String::from_utf8_lossy(&buf).trim_end()),
    }

    Ok(())
}
