use std::collections::BTreeSet;

use opencv::core::Mat;

use crate::config::Config;
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::{Frame, FrameNumber};
use crate::histogram::{ClassCounts, ClassHistogram};
use crate::projector::CoordinateProjector;
use crate::reaper::Reaper;
use crate::renderer::MapRenderer;
use crate::speed::SpeedEstimator;
use crate::store::{TrajectoryStore, Upsert};
use crate::vehicle::VehicleId;
use crate::Projection;

/// What became of one detection.
#[derive(Debug)]
pub enum Ingest {
    Upserted(VehicleId, Upsert),
    /// Recoverable: the detection is ignored for trajectory purposes.
    Skipped(Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub created: usize,
    pub appended: usize,
    pub skipped: usize,
}

impl IngestStats {
    fn record(&mut self, ingest: &Ingest) {
        match ingest {
            Ingest::Upserted(_, Upsert::Created) => self.created += 1,
            Ingest::Upserted(_, Upsert::Appended) => self.appended += 1,
            Ingest::Upserted(_, Upsert::Stale) | Ingest::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Output of the end-of-frame refresh pass.
pub struct Refresh {
    pub frame: FrameNumber,
    pub raster: Mat,
    pub counts: ClassCounts,
    pub evicted: BTreeSet<VehicleId>,
}

/// Per-frame pipeline: detections are projected and upserted, then a refresh
/// pass sweeps, renders and finally evicts.
pub struct TrafficMap<P: Projection = CoordinateProjector> {
    projector: P,
    store: TrajectoryStore,
    estimator: SpeedEstimator,
    reaper: Reaper,
    renderer: MapRenderer,
}

impl TrafficMap<CoordinateProjector> {
    pub fn new(config: &Config) -> Result<Self, Error> {
        config.validate()?;

        let estimator = config.speed_estimator();
        let renderer = MapRenderer::new(
            config.bounds,
            config.load_background()?,
            ClassHistogram::new(config.histogram),
            estimator,
        )?;

        tracing::info!(
            fps = config.fps,
            reference_latitude = config.reference_latitude(),
            "traffic map initialized"
        );

        Ok(Self::with_parts(
            config.projector()?,
            renderer,
            estimator,
            config.reaper(),
        ))
    }
}

impl<P: Projection> TrafficMap<P> {
    pub fn with_parts(
        projector: P,
        renderer: MapRenderer,
        estimator: SpeedEstimator,
        reaper: Reaper,
    ) -> Self {
        Self {
            projector,
            store: TrajectoryStore::new(estimator.window()),
            estimator,
            reaper,
            renderer,
        }
    }

    #[inline]
    pub fn store(&self) -> &TrajectoryStore {
        &self.store
    }

    #[inline]
    pub fn renderer(&self) -> &MapRenderer {
        &self.renderer
    }

    /// Speed in km/h; unknown ids and short histories both yield `None`.
    pub fn speed(&self, id: VehicleId) -> Option<f64> {
        self.store
            .speed_input(id)
            .and_then(|window| self.estimator.estimate_window(&window))
    }

    pub fn add_detection(&mut self, detection: &Detection, frame: FrameNumber) -> Ingest {
        let observation = match detection.normalize() {
            Ok(obs) => obs,
            Err(err) => {
                tracing::debug!(frame, %err, "detection skipped");
                return Ingest::Skipped(err);
            }
        };

        match self.projector.project(observation.camera) {
            Ok(position) => {
                let upsert =
                    self.store
                        .upsert(observation.id, position, observation.class, frame);

                Ingest::Upserted(observation.id, upsert)
            }
            Err(err) => {
                tracing::debug!(frame, id = observation.id, %err, "detection skipped");
                Ingest::Skipped(err)
            }
        }
    }

    /// Ingests every detection of `frame`. Must run before that frame's refresh.
    pub fn add_frame(&mut self, frame: &Frame) -> IngestStats {
        let mut stats = IngestStats::default();

        for detection in frame.iter() {
            let ingest = self.add_detection(detection, frame.number);
            stats.record(&ingest);
        }

        stats
    }

    /// Sweeps stale vehicles, renders the current state (stale ones
    /// included), then removes them.
    pub fn refresh(&mut self, frame: FrameNumber) -> Result<Refresh, Error> {
        let evicted = self.reaper.sweep(&self.store, frame);
        let rendered = self.renderer.render(&self.store)?;

        Reaper::apply(&mut self.store, &evicted);

        Ok(Refresh {
            frame,
            raster: rendered.raster,
            counts: rendered.counts,
            evicted,
        })
    }

    pub fn process(&mut self, frame: &Frame) -> Result<(IngestStats, Refresh), Error> {
        let stats = self.add_frame(frame);
        let refresh = self.refresh(frame.number)?;

        Ok((stats, refresh))
    }
}
