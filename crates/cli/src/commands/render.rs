//! Plain-text output for battle turns.

use parley_core::render::Render;

pub struct TerminalRender;

impl Render for TerminalRender {
    fn render(&self, text: &str) {
        println!("{text}\n");
    }
}
