//! Interactive block/unblock demo.
//!
//! Keys:
//! - `b` block
//! - `t` block with a 2 second auto-unblock
//! - `Escape` unblock
//! - `q` quit
//!
//! While blocked only `Escape` reaches the handlers below.
//!
//! Run with: `RUST_LOG=spark_blockui=trace cargo run --example blocking`
//! Logs go to `blockui-demo.log` in the system temp directory.

use std::cell::Cell;
use std::fs::File;
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::Mutex;

use crossterm::{
    cursor, execute, queue,
    style::Print,
    terminal::{self, ClearType},
};
use spark_blockui::state::input::{poll_event, route_event, InputEvent};
use spark_blockui::{
    BlockConfig, BlockManager, ElementKind, MemorySurface, Message, FRAME_INTERVAL,
};
use tracing_subscriber::EnvFilter;

/// Raw mode + alternate screen, restored on drop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

fn init_logging() -> io::Result<()> {
    let path = std::env::temp_dir().join("blockui-demo.log");
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn message_text(manager: &BlockManager<MemorySurface>) -> String {
    let Some(message) = manager.message() else {
        return String::new();
    };
    let surface = manager.surface();
    let Some(el) = surface.element(message) else {
        return String::new();
    };
    el.children
        .iter()
        .filter_map(|child| surface.element(*child))
        .map(|child| match &child.kind {
            ElementKind::Markup(markup) => markup.clone(),
            ElementKind::Spinner => "[spinner]".to_string(),
            ElementKind::Input => format!("[{}]", child.class),
            ElementKind::Container => String::new(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render(out: &mut impl Write, manager: &BlockManager<MemorySurface>, frame: u64) -> io::Result<()> {
    let opacity = manager.opacity();
    let bar_width = (opacity * 40.0).round() as usize;

    queue!(
        out,
        terminal::Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        Print("spark-blockui demo  (b block, t timed block, Esc unblock, q quit)"),
        cursor::MoveTo(0, 2),
        Print(format!(
            "state: {:?}   count: {}   trap: {}",
            manager.state(),
            manager.block_count(),
            if manager.trap().is_active() { "on" } else { "off" },
        )),
        cursor::MoveTo(0, 3),
        Print(format!("opacity: [{:<40}] {:.2}", "#".repeat(bar_width), opacity)),
        cursor::MoveTo(0, 5),
        Print(format!("message: {}", message_text(manager))),
        cursor::MoveTo(0, 7),
        Print(format!(
            "frame {frame}   suppressed keys: {}",
            manager.trap().suppressed_count()
        )),
    )?;
    out.flush()
}

fn run(manager: &BlockManager<MemorySurface>, running: &Cell<bool>) -> io::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut stdout = io::stdout();
    let mut frame = 0u64;

    while running.get() {
        while let Some(event) = poll_event(FRAME_INTERVAL)? {
            if let InputEvent::Resize(w, h) = event {
                tracing::debug!(w, h, "resize");
            }
            route_event(manager.keyboard(), event);
            if !running.get() {
                break;
            }
        }

        manager.scheduler().tick(FRAME_INTERVAL);
        frame += 1;
        render(&mut stdout, manager, frame)?;
    }

    Ok(())
}

fn main() -> io::Result<()> {
    init_logging()?;

    let manager = BlockManager::new(MemorySurface::new());
    let running = Rc::new(Cell::new(true));

    // The handler holds a manager clone; removing it breaks the cycle
    let remove_app_keys = {
        let keyboard = manager.keyboard().clone();
        let manager = manager.clone();
        let running = running.clone();
        keyboard.on(move |event| {
            if !event.is_press() {
                return false;
            }
            match event.key.as_str() {
                "b" => manager.block(BlockConfig::new().message("<h1>Working...</h1>")),
                "t" => manager.block(
                    BlockConfig::new()
                        .message(Message::Spinner)
                        .timeout_ms(2_000)
                        .on_unblocked(|| tracing::info!("timed block released")),
                ),
                "Escape" => manager.unblock(BlockConfig::new()),
                "q" => running.set(false),
                _ => return false,
            }
            true
        })
    };

    let result = run(&manager, &running);
    remove_app_keys();
    result
}
