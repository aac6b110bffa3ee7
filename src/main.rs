use clap::Parser;
use vocabtree::cli::SubCommandExtend;
use vocabtree::config::{Opts, SubCommand};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Build(config) => config.run(&opts),
        SubCommand::Show(config) => config.run(&opts),
        SubCommand::Export(config) => config.run(&opts),
    }
}
