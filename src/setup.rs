// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! The top-level container tying a whole simulation together.

use slog::Logger;

use crate::observer::ObserverToBodycentric;
use crate::ray::Ray;
use crate::{dipole::TiltedDipoleField, ParticleDistribution, RTIntegrator, RayTracer, Result,
            SynchrotronCalculator};

/// Everything needed to trace and integrate rays: the observer geometry, the
/// field model, the particle distribution, the ray-tracing strategy, the
/// synchrotron calculator, and the transfer integrator, plus the two scalars
/// that set the physical scale — the body's radius in cm and the observing
/// frequency in Hz.
///
/// The setup is immutable once built and is shared read-only between
/// threads while rays for different pixels are computed in parallel; that is
/// why the pluggable pieces are boxed `Send + Sync` trait objects.
pub struct VanAllenSetup {
    o2b: ObserverToBodycentric,
    bfield: TiltedDipoleField,
    distrib: Box<dyn ParticleDistribution>,
    ray_tracer: Box<dyn RayTracer>,
    synch_calc: Box<dyn SynchrotronCalculator>,
    rad_trans: Box<dyn RTIntegrator>,
    radius: f64,
    nu: f64,
    logger: Logger,
}

impl VanAllenSetup {
    /// Assemble a setup from its pieces. *radius* is the body's radius in
    /// cm; *nu* is the observing frequency in Hz.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        o2b: ObserverToBodycentric,
        bfield: TiltedDipoleField,
        distrib: Box<dyn ParticleDistribution>,
        ray_tracer: Box<dyn RayTracer>,
        synch_calc: Box<dyn SynchrotronCalculator>,
        rad_trans: Box<dyn RTIntegrator>,
        radius: f64,
        nu: f64,
        logger: Logger,
    ) -> Self {
        VanAllenSetup {
            o2b,
            bfield,
            distrib,
            ray_tracer,
            synch_calc,
            rad_trans,
            radius,
            nu,
            logger,
        }
    }

    /// The observer-to-bodycentric coordinate mapping.
    pub fn o2b(&self) -> &ObserverToBodycentric {
        &self.o2b
    }

    /// The magnetic field model.
    pub fn bfield(&self) -> &TiltedDipoleField {
        &self.bfield
    }

    /// The energetic-particle distribution.
    pub fn distrib(&self) -> &dyn ParticleDistribution {
        &*self.distrib
    }

    /// The synchrotron coefficient calculator.
    pub fn synch_calc(&self) -> &dyn SynchrotronCalculator {
        &*self.synch_calc
    }

    /// The radiative-transfer integrator.
    pub fn rad_trans(&self) -> &dyn RTIntegrator {
        &*self.rad_trans
    }

    /// The body's radius, in cm.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The observing frequency, in Hz.
    pub fn nu(&self) -> f64 {
        self.nu
    }

    /// The logger associated with this simulation.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Trace the ray for the observer pixel (x, y), in units of the body's
    /// radius, using this setup's ray-tracing strategy.
    pub fn get_ray(&self, x: f64, y: f64) -> Result<Ray> {
        self.ray_tracer.create_ray(x, y, self)
    }
}

impl std::fmt::Debug for VanAllenSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("VanAllenSetup")
            .field("o2b", &self.o2b)
            .field("bfield", &self.bfield)
            .field("radius", &self.radius)
            .field("nu", &self.nu)
            .finish()
    }
}
