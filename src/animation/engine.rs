use super::canvas::{cross_fade, ease_in_out_cubic, with_opacity};
use super::kinds::AnimationKind;
use super::timer::Timer;
use crate::app::config::AnimationConfig;
use crate::host::IconSink;
use image::RgbaImage;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    #[error("Progress value {0} is outside 0..=1")]
    InvalidProgress(f32),

    #[error("Animation engine is shut down")]
    Closed,
}

/// What a `start` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Nothing was showing
    Started,
    /// Different kind was showing; cross-fading into the new one
    Transitioned,
    /// Same kind was showing; parameters updated in place
    Updated,
}

struct Transition {
    from: RgbaImage,
    started: Instant,
}

struct Active {
    kind: AnimationKind,
    frame: u32,
    transition: Option<Transition>,
}

/// The single progress instance; survives across animations
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressTrack {
    pub current: f32,
    pub target: f32,
}

impl ProgressTrack {
    fn step(&mut self, step: f32) {
        let delta = self.target - self.current;
        if delta.abs() <= step {
            self.current = self.target;
        } else {
            self.current += step.copysign(delta);
        }
    }
}

#[derive(Default)]
struct State {
    current: Option<Active>,
    frame_timer: Timer,
    stop_timer: Timer,
    fade_timer: Timer,
    progress: ProgressTrack,
    last_frame: Option<RgbaImage>,
    transitions: u64,
    closed: bool,
}

struct Inner {
    icon: Arc<dyn IconSink>,
    config: AnimationConfig,
    state: Mutex<State>,
}

/// Drives the toolbar icon
///
/// One frame clock renders the active animation; an auto-stop timer per
/// `start` call hands over to a fade-out loop which finally restores the
/// default icon. The frame clock and the fade loop never run together.
pub struct AnimationEngine {
    inner: Arc<Inner>,
}

impl AnimationEngine {
    pub fn new(icon: Arc<dyn IconSink>, config: AnimationConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                icon,
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Show `kind`, (re)arming its auto-stop timer
    ///
    /// `value` is the progress fraction and must lie in 0..=1; it is ignored
    /// for kinds other than [`AnimationKind::Progress`]. An invalid value
    /// leaves the engine untouched.
    pub fn start(
        &self,
        kind: AnimationKind,
        value: Option<f32>,
    ) -> Result<StartOutcome, AnimationError> {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                return Err(AnimationError::InvalidProgress(v));
            }
        }

        let inner = &self.inner;
        let mut st = inner.state.lock().unwrap();
        if st.closed {
            return Err(AnimationError::Closed);
        }
        st.fade_timer.stop();

        let outcome = match st.current.as_ref().map(|a| a.kind) {
            Some(showing) if showing == kind => StartOutcome::Updated,
            Some(showing) => {
                // Nothing drawn yet: fade from the outgoing kind's current frame
                let from = match st.last_frame.clone() {
                    Some(frame) => frame,
                    None => {
                        let frame = st.current.as_ref().map_or(0, |a| a.frame);
                        showing.render(frame, inner.config.icon_size, st.progress.current)
                    }
                };
                st.current = Some(Active {
                    kind,
                    frame: 0,
                    transition: Some(Transition {
                        from,
                        started: Instant::now(),
                    }),
                });
                st.transitions += 1;
                StartOutcome::Transitioned
            }
            None => {
                st.current = Some(Active {
                    kind,
                    frame: 0,
                    transition: None,
                });
                StartOutcome::Started
            }
        };

        if kind == AnimationKind::Progress {
            if let Some(v) = value {
                st.progress.target = v;
            }
        }

        let weak = Arc::downgrade(inner);
        st.stop_timer.replace(Timer::once(kind.duration(&inner.config), move || {
            if let Some(inner) = weak.upgrade() {
                inner.begin_fade_out();
            }
        }));

        // Check before create: one frame clock per engine
        if !st.frame_timer.is_active() {
            st.frame_timer = frame_clock(Arc::downgrade(inner), inner.frame_interval());
        }

        tracing::trace!("Animation {} {:?}", kind, outcome);
        Ok(outcome)
    }

    /// Fade out now instead of waiting for the auto-stop timer
    pub fn stop(&self) {
        self.inner.begin_fade_out();
    }

    /// Stop every timer and restore the default icon without fading
    pub async fn reset(&self) {
        self.inner.clear();
        if let Err(e) = self.inner.icon.restore_default().await {
            tracing::debug!("Failed to restore default icon: {}", e);
        }
    }

    /// Reset and refuse further `start` calls
    pub async fn shutdown(&self) {
        self.reset().await;
        self.inner.state.lock().unwrap().closed = true;
    }

    pub fn current_kind(&self) -> Option<AnimationKind> {
        self.inner
            .state
            .lock()
            .unwrap()
            .current
            .as_ref()
            .map(|a| a.kind)
    }

    pub fn is_fading(&self) -> bool {
        self.inner.state.lock().unwrap().fade_timer.is_active()
    }

    pub fn is_transitioning(&self) -> bool {
        self.inner
            .state
            .lock()
            .unwrap()
            .current
            .as_ref()
            .is_some_and(|a| a.transition.is_some())
    }

    /// Cross-fades started since creation
    pub fn transition_count(&self) -> u64 {
        self.inner.state.lock().unwrap().transitions
    }

    pub fn progress(&self) -> ProgressTrack {
        self.inner.state.lock().unwrap().progress
    }
}

impl Drop for AnimationEngine {
    fn drop(&mut self) {
        self.inner.clear();
    }
}

fn frame_clock(weak: Weak<Inner>, period: Duration) -> Timer {
    Timer::repeating(period, move || {
        let weak = weak.clone();
        async move {
            match weak.upgrade() {
                Some(inner) => inner.render_tick().await,
                None => false,
            }
        }
    })
}

impl Inner {
    fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.config.frame_interval_ms.max(1))
    }

    fn clear(&self) {
        let mut st = self.state.lock().unwrap();
        st.frame_timer.stop();
        st.stop_timer.stop();
        st.fade_timer.stop();
        st.current = None;
        st.last_frame = None;
    }

    /// One frame-clock tick; false ends the clock
    async fn render_tick(&self) -> bool {
        let frame = {
            let mut st = self.state.lock().unwrap();
            if st.closed {
                return false;
            }
            let progress = st.progress.current;
            let Some(active) = st.current.as_mut() else {
                return false;
            };
            let kind = active.kind;

            let mut img = kind.render(active.frame, self.config.icon_size, progress);
            if let Some(transition) = &active.transition {
                let total = self.config.transition_ms.max(1) as f32;
                let t = transition.started.elapsed().as_millis() as f32 / total;
                img = cross_fade(&transition.from, &img, ease_in_out_cubic(t));
                if t >= 1.0 {
                    active.transition = None;
                }
            }
            active.frame = (active.frame + 1) % kind.frames_per_cycle();

            if kind == AnimationKind::Progress {
                st.progress.step(self.config.progress_step);
            }
            st.last_frame = Some(img.clone());
            img
        };

        if let Err(e) = self.icon.set_icon(&frame).await {
            tracing::debug!("Failed to draw icon frame: {}", e);
        }
        true
    }

    /// Hand over from the frame clock to the fade loop
    fn begin_fade_out(self: &Arc<Self>) {
        let mut st = self.state.lock().unwrap();
        if st.closed || st.current.is_none() || st.fade_timer.is_active() {
            return;
        }
        st.frame_timer.stop();

        let steps = self.config.fade_steps.max(1);
        let period = Duration::from_millis(self.config.fade_step_ms.max(1));
        let weak = Arc::downgrade(self);
        let mut step = 0;
        st.fade_timer = Timer::repeating(period, move || {
            step += 1;
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.fade_tick(step, steps).await,
                    None => false,
                }
            }
        });
    }

    /// One fade step; the last one restores the default icon
    async fn fade_tick(&self, step: u32, steps: u32) -> bool {
        let frame = {
            let mut st = self.state.lock().unwrap();
            if st.closed || st.current.is_none() {
                return false;
            }
            let faded = if step < steps {
                st.last_frame
                    .as_ref()
                    .map(|last| with_opacity(last, 1.0 - step as f32 / steps as f32))
            } else {
                None
            };
            if faded.is_none() {
                st.current = None;
                st.last_frame = None;
            }
            faded
        };

        match frame {
            Some(img) => {
                if let Err(e) = self.icon.set_icon(&img).await {
                    tracing::debug!("Failed to draw fade frame: {}", e);
                }
                true
            }
            None => {
                if let Err(e) = self.icon.restore_default().await {
                    tracing::debug!("Failed to restore default icon: {}", e);
                }
                false
            }
        }
    }
}
