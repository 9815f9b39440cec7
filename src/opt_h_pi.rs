use std::{ env, fmt::Write as _, fs };
use ndarray as nd;
use tracing::info;
use tracing_subscriber::{ fmt, prelude::*, EnvFilter };
use greenopt::{
    config::RunConfig,
    driver::{ OptGreen, OptResult },
    error::OptError,
};

const DEFAULT_CONFIG: &str = r#"
    basis_type = "STO"
    w0 = 1.0
    ws = [0.8, 0.9, 1.0, 1.5, 2.0]
    channel = "1s->kp"
    dipole = "length"

    [[basis]]
    cmd = "id"
    opt = true
    n = 2
    z = [0.6, -0.6]
"#;

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
}

// usage: opt_h_pi [config.toml] [wavefunction output]
fn main() -> OptResult<()> {
    setup_logging();
    let args: Vec<String> = env::args().skip(1).collect();
    let config = match args.first() {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::from_toml_str(DEFAULT_CONFIG)?,
    };
    let opt = OptGreen::from_config(&config)?;
    let sweep = opt.run(())?;

    for (w, sol) in sweep.points.iter() {
        println!("w = {}", w);
        println!("convergence = {}", if sol.success { "Yes" } else { "No" });
        for (i, z) in opt.raw_exponents(&sol.x)?.iter().enumerate() {
            println!("zeta{} = {}", i, z);
        }
        println!("alpha = {}", sol.val);
    }
    for (w, err) in sweep.failures.iter() {
        println!("w = {}", w);
        println!("convergence = No ({})", err);
    }

    if let Some(outfile) = args.get(1) {
        let w0 = opt.schedule().w0;
        let ys = sweep.get(w0).map(|sol| &sol.x).unwrap_or(opt.y0());
        let rs: nd::Array1<f64> = nd::Array1::linspace(0.0, 40.0, 401);
        let wf = opt.wavefunction(w0, ys, &rs)?;
        let mut out = String::new();
        for (r, psi) in rs.iter().zip(wf.iter()) {
            // writing to a String is infallible
            let _ = writeln!(out, "{:.5} {:.15e} {:.15e}", r, psi.re, psi.im);
        }
        fs::write(outfile, out)
            .map_err(|source| OptError::Io { path: outfile.clone(), source })?;
        info!(path = %outfile, w0, "wrote wavefunction");
    }
    Ok(())
}
