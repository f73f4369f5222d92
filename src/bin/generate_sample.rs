use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

/// Write a synthetic MS2723B save file.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Output path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of trace points
    #[arg(long, default_value_t = 551)]
    points: usize,

    /// Center frequency in MHz
    #[arg(long, default_value_t = 100.0)]
    center: f64,

    /// Span in MHz
    #[arg(long, default_value_t = 10.0)]
    span: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Noise floor around -95 dBm with a few carriers on top.
fn trace_points(args: &Args, rng: &mut SimpleRng) -> Vec<(f64, f64)> {
    let start = args.center - args.span / 2.0;
    let step = if args.points > 1 {
        args.span / (args.points - 1) as f64
    } else {
        0.0
    };
    let carriers = [
        (args.center, args.span / 200.0, 55.0),
        (args.center - args.span / 4.0, args.span / 150.0, 30.0),
        (args.center + args.span / 3.0, args.span / 300.0, 20.0),
    ];

    (0..args.points)
        .map(|i| {
            let freq = start + i as f64 * step;
            let signal: f64 = carriers
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(freq, mu, sigma, amp))
                .sum();
            (freq, -95.0 + signal + rng.gauss(0.0, 1.5))
        })
        .collect()
}

fn render(args: &Args) -> Result<String, std::fmt::Error> {
    let mut rng = SimpleRng::new(args.seed);
    let mut out = String::new();

    writeln!(out, "Model=MS2723B")?;
    writeln!(out, "Serial={:07}", args.seed % 10_000_000)?;
    writeln!(out, "Mode=Spectrum Analyzer")?;
    writeln!(out, "# Begin Setup\n<Setup>")?;
    writeln!(out, "CENTER_FREQ={:.3} MHz", args.center)?;
    writeln!(out, "SPAN={:.3} MHz", args.span)?;
    writeln!(out, "RBW=30 kHz")?;
    writeln!(out, "# Begin Marker\nM1_STATE=Off\n# Marker Done")?;
    writeln!(out, "# Setup Done")?;
    writeln!(out, "# Begin Trace\n<Trace>")?;
    for (i, (freq, power)) in trace_points(args, &mut rng).into_iter().enumerate() {
        writeln!(out, "P_{i}={power:.2} , {freq:.4} MHz")?;
    }
    writeln!(out, "# Trace Done")?;
    Ok(out)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let text = render(&args)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {} trace points to {}", args.points, path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
