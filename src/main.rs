use clap::Parser;
use clap::ValueEnum;
use curador::bot::handler::Handler;
use curador::{digest, health, pipeline, reader};
use dotenv::dotenv;

#[derive(Parser)]
#[command(name = "curador", about = "Telegram channel curation and digest bot")]
struct Cli {
    /// Which role this process runs.
    #[arg(long, value_enum)]
    mode: Mode,

    /// With --mode digest: run one build and exit.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Bot,
    Reader,
    Worker,
    Digest,
    Http,
}

fn main() {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Bot => Handler::start(),
        Mode::Reader => reader::start(),
        Mode::Worker => pipeline::start(),
        Mode::Digest => digest::start(cli.once),
        Mode::Http => health::start(),
    }
}
