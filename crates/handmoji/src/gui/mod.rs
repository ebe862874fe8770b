//! A minimal window that shows composed frames.
//!
//! winit requires the event loop to run on the main thread, so [`run`] takes over the main thread
//! and runs the application code on a spawned one. The application talks to the event loop through
//! [`show_image`] and [`on_close`].

mod renderer;

use std::{
    collections::HashMap,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{Mutex, PoisonError},
};

use anyhow::{anyhow, Context};
use once_cell::sync::OnceCell;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::image::{Image, Resolution};

use self::renderer::{Gpu, Renderer, Window};

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
    close_handlers: Vec<Box<dyn FnOnce() + Send>>,
}

impl Gui {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            gpu: Rc::new(pollster::block_on(Gpu::open())?),
            windows: HashMap::new(),
            win_id_to_key: HashMap::new(),
            close_handlers: Vec::new(),
        })
    }

    fn renderer_mut(&mut self, win: WindowId) -> Option<&mut Renderer> {
        let key = self.win_id_to_key.get(&win)?;
        self.windows.get_mut(key)
    }

    fn show_image(
        &mut self,
        target: &EventLoopWindowTarget<Msg>,
        key: String,
        res: Resolution,
        data: &[u8],
    ) -> anyhow::Result<()> {
        let needs_window = self
            .windows
            .get(&key)
            .map_or(true, |renderer| renderer.resolution() != res);
        if needs_window {
            log::debug!("creating window for image '{key}' at {res}");
            let win = Window::open(target, &key, res)?;
            let renderer = Renderer::new(win, self.gpu.clone())?;
            self.win_id_to_key.insert(renderer.window().id(), key.clone());
            if let Some(old) = self.windows.insert(key.clone(), renderer) {
                self.win_id_to_key.remove(&old.window().id());
            }
        }

        let renderer = self
            .windows
            .get_mut(&key)
            .context("window vanished after creation")?;
        renderer.update_texture(res, data)?;
        renderer.window().request_redraw();
        Ok(())
    }

    fn close(&mut self, flow: &mut ControlFlow) {
        log::info!("window closed, shutting down");
        for handler in self.close_handlers.drain(..) {
            handler();
        }
        self.windows.clear();
        self.win_id_to_key.clear();
        *flow = ControlFlow::Exit;
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { key, res, data }) => {
                    if let Err(e) = self.show_image(target, key, res, &data) {
                        log::error!("failed to show image: {e:#}");
                    }
                }
                Event::UserEvent(Msg::OnClose(handler)) => {
                    self.close_handlers.push(handler);
                }
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => self.close(flow),
                Event::RedrawRequested(window) => {
                    if let Some(renderer) = self.renderer_mut(window) {
                        if let Err(e) = renderer.redraw() {
                            log::error!("redraw failed: {e:#}");
                        }
                    }
                }
                _ => {}
            }
        });
    }
}

enum Msg {
    Image {
        key: String,
        res: Resolution,
        data: Vec<u8>,
    },
    OnClose(Box<dyn FnOnce() + Send>),
}

impl fmt::Debug for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Msg::Image { key, res, .. } => f
                .debug_struct("Image")
                .field("key", key)
                .field("res", res)
                .finish_non_exhaustive(),
            Msg::OnClose(_) => f.write_str("OnClose"),
        }
    }
}

static PROXY: OnceCell<Mutex<EventLoopProxy<Msg>>> = OnceCell::new();

fn send(msg: Msg) -> anyhow::Result<()> {
    let proxy = PROXY
        .get()
        .ok_or_else(|| anyhow!("GUI is not running; call `gui::run` first"))?;
    proxy
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .send_event(msg)
        .map_err(|_closed| anyhow!("GUI event loop has exited"))
}

/// Runs `cb` on a new thread while the calling thread runs the GUI event loop.
///
/// Never returns: the process exits with status 0 when `cb` returns `Ok`, with status 1 after
/// printing the error when it returns `Err`, and with status 101 when it panics.
pub fn run<F>(cb: F) -> !
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    if PROXY.set(Mutex::new(event_loop.create_proxy())).is_err() {
        eprintln!("Error: `gui::run` was called twice");
        process::exit(1);
    }

    // Event loop is now initialized; spawn another thread to run the application code.
    std::thread::spawn(move || match catch_unwind(AssertUnwindSafe(cb)) {
        Ok(Ok(())) => process::exit(0),
        Ok(Err(e)) => {
            eprintln!("Error: {e:?}");
            process::exit(1);
        }
        Err(_payload) => {
            // The panic hook has printed the message already; 101 is what libstd exits with.
            process::exit(101);
        }
    });

    match Gui::new() {
        Ok(gui) => gui.run(event_loop),
        Err(e) => {
            eprintln!("Error: failed to initialize graphics: {e:?}");
            process::exit(1);
        }
    }
}

/// Displays `image` in the window titled `key`, creating the window on first use.
///
/// Fails if [`run`] has not been called or the event loop has exited.
pub fn show_image(key: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    // Image data is RGBA8 internally so that no conversion before GPU upload is needed.
    send(Msg::Image {
        key: key.into(),
        res: image.resolution(),
        data: image.data().to_vec(),
    })
}

/// Registers `handler` to be called on the event loop thread when a window is closed.
pub fn on_close<F>(handler: F) -> anyhow::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    send(Msg::OnClose(Box::new(handler)))
}
