use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The address of the master's registration server.
    #[arg(short = 'j', long = "join", default_value = "http://[::1]:7777")]
    pub master: String,

    /// The port to run the worker on.
    #[arg(short, long)]
    pub port: u16,

    /// Name of the workload to run.
    #[arg(short, long, default_value = "wc")]
    pub workload: String,

    /// Stop serving after this many jobs. Negative means never.
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub max_jobs: i64,
}
