//! Headless stand-in for the drawing surface: every frame that had at least
//! one redraw request becomes one JSON line on the output.

use kaleido_core::EntitySnapshot;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;

#[derive(Serialize)]
struct Frame<'a> {
    frame: u64,
    elapsed_ms: u128,
    redraw_requests: usize,
    entities: &'a [EntitySnapshot],
}

/// Running totals reported when the runner shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub frames_skipped: u64,
    pub redraw_requests: u64,
}

pub struct FramePresenter<W: Write> {
    out: W,
    started: Instant,
    stats: FrameStats,
}

impl<W: Write> FramePresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: Instant::now(),
            stats: FrameStats::default(),
        }
    }

    /// Draws a frame if anything asked for one since the last frame.
    /// Returns whether a frame was written.
    pub fn present(
        &mut self,
        redraw_requests: usize,
        snapshots: &[EntitySnapshot],
    ) -> io::Result<bool> {
        if redraw_requests == 0 {
            self.stats.frames_skipped += 1;
            return Ok(false);
        }

        let frame = Frame {
            frame: self.stats.frames_presented,
            elapsed_ms: self.started.elapsed().as_millis(),
            redraw_requests,
            entities: snapshots,
        };
        serde_json::to_writer(&mut self.out, &frame)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;

        self.stats.frames_presented += 1;
        self.stats.redraw_requests += redraw_requests as u64;
        Ok(true)
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_core::{MotionSettings, World};

    #[test]
    fn idle_frames_are_skipped() {
        let mut presenter = FramePresenter::new(Vec::new());
        assert!(!presenter.present(0, &[]).unwrap());
        assert_eq!(presenter.stats().frames_skipped, 1);
        assert!(presenter.into_inner().is_empty());
    }

    #[test]
    fn frames_are_written_as_json_lines() {
        let mut world = World::with_entities(MotionSettings::default(), 2, Some(8)).unwrap();
        world.resize(500, 500).unwrap();
        world.step_all();

        let mut presenter = FramePresenter::new(Vec::new());
        assert!(presenter.present(2, &world.snapshots()).unwrap());
        world.step_all();
        assert!(presenter.present(3, &world.snapshots()).unwrap());

        assert_eq!(
            presenter.stats(),
            FrameStats { frames_presented: 2, frames_skipped: 0, redraw_requests: 5 }
        );

        let output = String::from_utf8(presenter.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["frame"], 1);
        assert_eq!(second["redraw_requests"], 3);
        assert_eq!(second["entities"].as_array().unwrap().len(), 2);
        assert_eq!(second["entities"][0]["position"]["x"], 12);
        assert_eq!(second["entities"][0]["position"]["y"], 8);
    }
}
