// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! Render a synthetic synchrotron image of a canned magnetosphere and print
//! it as tab-separated values, one pixel per row.
//!
//! The "torus" demo is a Jupiter-like body: dipole tilted 15 degrees with a
//! 3000 G surface field, seen from 10 degrees above the equator, with a
//! uniform torus of energetic electrons at 5 body radii observed at 95 GHz.

use slog::info;
use std::time::Instant;

use vanallen::{
    BasicRayTracer, FormalRTIntegrator, ImageMaker, ObserverToBodycentric,
    PowerLawSynchrotronCalculator, SimpleTorusDistribution, StokesParam, TiltedDipoleField,
    VanAllenSetup, RJUP,
};

fn torus_setup(logger: slog::Logger) -> vanallen::Result<VanAllenSetup> {
    let loc = 10_f64.to_radians();
    let cml = 20_f64.to_radians();
    let tilt = 15_f64.to_radians();

    Ok(VanAllenSetup::new(
        ObserverToBodycentric::new(loc, cml)?,
        TiltedDipoleField::new(tilt, 3000.)?,
        Box::new(SimpleTorusDistribution::new(5., 2., 1e5, 3.)),
        Box::new(BasicRayTracer::default()),
        Box::new(PowerLawSynchrotronCalculator::new()),
        Box::new(FormalRTIntegrator::new()),
        1.1 * RJUP,
        95e9,
        logger,
    ))
}

fn main() {
    let matches = clap::Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about("Render a synthetic synchrotron image of a canned magnetosphere")
        .arg(
            clap::Arg::new("DEMONAME")
                .help("Which demo configuration to render")
                .required(true)
                .value_parser(["torus"])
                .index(1),
        )
        .get_matches();

    let log = vanallen_test_support::default_log();

    let setup = match matches.get_one::<String>("DEMONAME").unwrap().as_str() {
        "torus" => torus_setup(log.clone()),
        _ => unreachable!(),
    }
    .expect("failed to build the demo setup");

    let im = ImageMaker::new(&setup);
    info!(log, "rendering"; "nx" => im.nx, "ny" => im.ny, "nu_hz" => setup.nu());

    let t0 = Instant::now();
    let cube = im.compute().expect("failed to compute the image");
    let elapsed = t0.elapsed();

    info!(log, "done";
          "time_ms" => elapsed.as_secs() as f64 * 1000. + f64::from(elapsed.subsec_nanos()) * 1e-6,
          "flux_i" => StokesParam::I.flux(&cube),
          "frac_linear" => StokesParam::FracLinear.flux(&cube),
          "frac_circular" => StokesParam::FracCircular.flux(&cube));

    println!("ix\tiy\tx(radii)\ty(radii)\ti\tq\tu\tv");

    for iy in 0..im.ny {
        for ix in 0..im.nx {
            let (x, y) = im.map_pixel(ix, iy);
            println!(
                "{}\t{}\t{:.3}\t{:.3}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}",
                ix,
                iy,
                x,
                y,
                cube[(0, iy, ix)],
                cube[(1, iy, ix)],
                cube[(2, iy, ix)],
                cube[(3, iy, ix)]
            );
        }
    }
}
