//! Opal - Main Entry Point
//!
//! Initializes the attack tables and the NNUE network, then hands control
//! to the UCI loop. A weight file named on the command line must load or
//! the process exits non-zero; the default file is only probed.

use anyhow::{Context, Result};
use opal::constants::{DEFAULT_NET_PATH, ENGINE_AUTHOR, ENGINE_NAME, ENGINE_VERSION};
use opal::nnue::Network;
use opal::uci::UciHandler;
use std::sync::Arc;

fn main() -> Result<()> {
    println!("{} {} by {}", ENGINE_NAME, ENGINE_VERSION, ENGINE_AUTHOR);

    // Force the static tables up front instead of on the first search
    lazy_static::initialize(&opal::attacks::ATTACKS);
    lazy_static::initialize(&opal::zobrist::ZOBRIST);

    let net = match std::env::args().nth(1) {
        // An explicit weight file is a hard requirement
        Some(path) => Some(Arc::new(
            Network::load(&path).with_context(|| format!("cannot start without {}", path))?,
        )),
        None => match Network::load(DEFAULT_NET_PATH) {
            Ok(net) => Some(Arc::new(net)),
            Err(_) => {
                println!(
                    "info string no {} found, using material evaluation",
                    DEFAULT_NET_PATH
                );
                None
            }
        },
    };

    UciHandler::new(net).run();
    Ok(())
}
