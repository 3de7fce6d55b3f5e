#![warn(clippy::all)]

#[cfg(target_arch = "wasm32")]
#[global_allocator]
static ALLOC: talc::TalckWasm = unsafe { talc::TalckWasm::new_global() };

pub mod cache;
pub mod config;
pub mod constants;
pub mod features;
pub mod findnearest;
pub mod game_loop;
pub mod location;
pub mod logging;
pub mod memory;
pub mod pathing;
pub mod room;
pub mod serialize;
pub mod spawn;
pub mod tasks;
pub mod unit;
pub mod world;

#[cfg(any(test, feature = "sandbox"))]
pub mod sandbox;

#[cfg(feature = "screeps")]
mod panic;
#[cfg(feature = "screeps")]
pub mod screeps_impl;

#[cfg(feature = "screeps")]
mod exports {
    use super::*;
    use std::cell::RefCell;
    use wasm_bindgen::prelude::*;

    thread_local! {
        static AGENT: RefCell<Option<(game_loop::Agent, screeps_impl::LiveGame)>> = const { RefCell::new(None) };
    }

    #[wasm_bindgen(js_name = setup)]
    pub fn setup() {
        logging::setup_logging(logging::Info);
        panic::setup_panic_hook();
    }

    #[wasm_bindgen(js_name = game_loop)]
    pub fn game_loop_export() {
        AGENT.with(|cell| {
            let mut state = cell.borrow_mut();

            let (agent, game) = state.get_or_insert_with(|| {
                log::info!("Global reset, creating agent");

                (game_loop::Agent::default(), screeps_impl::LiveGame::default())
            });

            let mut memory = screeps_impl::load_memory();

            game.begin_tick();
            agent.tick(game, &mut memory);

            screeps_impl::save_memory(&memory);
        });
    }
}
