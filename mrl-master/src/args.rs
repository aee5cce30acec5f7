use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The port workers register on.
    #[arg(short, long, default_value = "7777")]
    pub port: u16,

    /// The input file. Splits, intermediate files and the result are
    /// written next to it.
    #[arg(short, long)]
    pub file: String,

    /// Number of map jobs (input splits).
    #[arg(
        short = 'm',
        long,
        default_value = "5",
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub n_map: usize,

    /// Number of reduce jobs (output partitions).
    #[arg(
        short = 'r',
        long,
        default_value = "3",
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub n_reduce: usize,

    /// Keep splits and intermediate files after the run.
    #[arg(long)]
    pub keep_intermediate: bool,
}
