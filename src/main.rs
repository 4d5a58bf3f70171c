mod codec;
mod config;
mod flash;
mod ftl;

#[macro_use]
extern crate log;
extern crate simplelog;

use crate::config::*;
use crate::flash::MemFlash;
use crate::ftl::Ftl;
use byte_unit::Byte;
use rand::prelude::*;
use simplelog::*;
use time::macros::format_description;

fn main() {
    let log_cfg = ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond]"))
        .build();

    SimpleLogger::init(LevelFilter::Trace, log_cfg).unwrap();

    info!(
        "Simulated device: {} blocks of {}, {} total",
        TOTAL_BLOCKS,
        Byte::from(BLOCK_SIZE).get_appropriate_unit(true).to_string(),
        Byte::from(CAPACITY).get_appropriate_unit(true).to_string()
    );

    let mut fs = Ftl::new(MemFlash::new());
    fs.initialize().unwrap();
    fs.load().unwrap();

    let mut rng: SmallRng = SmallRng::seed_from_u64(7);
    let payload = [0xA5u8; 4096];

    for round in 0..4 {
        for _ in 0..TOTAL_BLOCKS {
            let logical = rng.gen_range(0..TOTAL_BLOCKS as BlockId);
            fs.write(logical, &payload).unwrap();
        }
        info!("Round {} randomly written", round);
    }

    let counts = fs.erase_counts();
    let min = counts.iter().min().unwrap();
    let max = counts.iter().max().unwrap();
    info!(
        "Erase counts: min {}, max {}, total {}",
        min,
        max,
        fs.total_erase_count()
    );
}
