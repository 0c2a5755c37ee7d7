//! zplane CLI: headless driver for the filter designer.
//!
//! Synthesizes (or loads) a filter, replays a signal through it on the
//! designer's tick, writes the text artifacts and can audition the result on
//! an output device.

use std::error::Error;
use std::thread;

use tracing::{info, warn, Level};
use zplane_core::allpass::AllPassPreset;
use zplane_core::design::{DesignRequest, FilterFamily, ResponseType};
use zplane_core::dsp::lin_to_db;
use zplane_engine::{DesignerConfig, FilterDesigner, SampleSource};

#[derive(Debug, Default)]
struct Args {
    family: Option<String>,
    response: Option<String>,
    order: Option<usize>,
    cutoff: Option<f64>,
    ripple: Option<f64>,
    load: Option<String>,
    allpass: Option<f64>,
    preset: Option<usize>,
    signal: Option<String>,
    rate: Option<u32>,
    points: Option<usize>,
    paced: bool,
    out: Option<String>,
    save: Option<String>,
    export: Option<String>,
    emit_c: Option<String>,
    play: bool,
    duration_sec: Option<u64>,
    device_name: Option<String>,
    gain: Option<f32>,
    list_devices: bool,
    verbose: bool,
}

fn parse_args() -> Args {
    let mut a = Args::default();
    for s in std::env::args().skip(1) {
        if s == "--paced"        { a.paced = true;        continue; }
        if s == "--play"         { a.play = true;         continue; }
        if s == "--list-devices" { a.list_devices = true; continue; }
        if s == "--verbose"      { a.verbose = true;      continue; }
        if let Some(rest) = s.strip_prefix("--family=")   { a.family   = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--response=") { a.response = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--order=")    { a.order    = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--cutoff=")   { a.cutoff   = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--ripple=")   { a.ripple   = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--load=")     { a.load     = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--allpass=")  { a.allpass  = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--preset=")   { a.preset   = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--signal=")   { a.signal   = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--rate=")     { a.rate     = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--points=")   { a.points   = rest.parse().ok();      continue; }
        if let Some(rest) = s.strip_prefix("--out=")      { a.out      = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--save=")     { a.save     = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--export=")   { a.export   = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--emit-c=")   { a.emit_c   = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--duration=") { a.duration_sec = rest.parse().ok();  continue; }
        if let Some(rest) = s.strip_prefix("--device=")   { a.device_name  = Some(rest.to_string()); continue; }
        if let Some(rest) = s.strip_prefix("--gain=")     { a.gain     = rest.parse().ok();      continue; }
        eprintln!("[warn] unknown arg: {s}");
    }
    a
}

fn design_request(args: &Args) -> Result<Option<DesignRequest>, Box<dyn Error>> {
    let Some(family) = args.family.as_deref() else { return Ok(None) };
    let family: FilterFamily = family.parse()?;
    let response: ResponseType = args.response.as_deref().unwrap_or("lowpass").parse()?;
    let mut req = DesignRequest::new(family, response, args.order.unwrap_or(4), args.cutoff.unwrap_or(0.25));
    if let Some(rp) = args.ripple {
        req = req.with_ripple(rp);
    } else if family.uses_ripple() {
        req = req.with_ripple(1.0);
        warn!(%family, "no --ripple given, using 1 dB");
    }
    Ok(Some(req))
}

fn print_summary(d: &FilterDesigner) {
    let co = d.current_coefficients();
    let r = d.current_response(0);
    println!("zeros: {}  poles: {}  gain: {}", d.model().zeros().len(), d.model().poles().len(), d.model().gain());
    println!("order: {}", co.order());
    println!("b = {:?}", co.numerator);
    println!("a = {:?}", co.denominator);
    if let Some(peak) = r.peak_index() {
        println!(
            "peak |H| = {:.4} ({:.2} dB) at {:.4}·π rad/sample",
            r.magnitude[peak],
            lin_to_db(r.magnitude[peak]),
            r.frequency[peak]
        );
    }
    println!("sections: {}", d.current_sos().len());
}

fn replay(d: &mut FilterDesigner, args: &Args) -> Result<(), Box<dyn Error>> {
    let limit = args.points.unwrap_or(usize::MAX);
    let interval = d.bulk().tick_interval();
    d.start()?;
    let mut count = 0usize;
    let mut peak = 0.0f64;
    while count < limit {
        match d.tick()? {
            Some(y) => {
                count += 1;
                peak = peak.max(y.abs());
                if args.paced {
                    thread::sleep(interval);
                }
            }
            None => break,
        }
    }
    if d.bulk().is_running() {
        d.stop()?;
    }
    info!(samples = count, of = d.bulk().source().len(), peak, "replay finished");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    if args.list_devices {
        audition::list_output_devices()?;
        return Ok(());
    }

    println!("zplane: pole/zero filter designer\n");

    let config = DesignerConfig { points_per_second: args.rate.unwrap_or(10), ..DesignerConfig::default() };
    let mut d = FilterDesigner::new(config)?;

    if let Some(path) = &args.load {
        d.load_filter(path)?;
    } else if let Some(req) = design_request(&args)? {
        d.design(&req)?;
    }
    if let Some(a) = args.allpass {
        d.add_allpass(a)?;
    }
    if let Some(i) = args.preset {
        let library = AllPassPreset::library();
        let preset = library
            .get(i.wrapping_sub(1))
            .ok_or_else(|| format!("preset {i} out of range 1..={}", library.len()))?;
        d.add_allpass_preset(*preset)?;
    }

    print_summary(&d);

    if let Some(path) = &args.signal {
        d.load_signal(path)?;
    }
    replay(&mut d, &args)?;
    if let Some(path) = &args.out {
        d.write_replay(path)?;
    }

    if let Some(path) = &args.save   { d.save_filter(path)?; }
    if let Some(path) = &args.export { d.export_realization(path)?; }
    if let Some(path) = &args.emit_c { d.write_source(path)?; }

    if args.play {
        audition::run(&d, &args)?;
    }
    Ok(())
}

cfg_if::cfg_if! {
    if #[cfg(feature = "realtime")] {
        mod audition {
            use super::Args;
            use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
            use std::error::Error;
            use std::time::Duration;
            use zplane_engine::{FilterDesigner, SignalReplay, StreamingFilterEngine};

            pub fn list_output_devices() -> Result<(), Box<dyn Error>> {
                let host = cpal::default_host();
                println!("Available output devices:");
                for dev in host.output_devices()? {
                    println!("- {}", dev.name()?);
                }
                Ok(())
            }

            fn pick_device(name: Option<&str>) -> Result<cpal::Device, Box<dyn Error>> {
                let host = cpal::default_host();
                if let Some(name) = name {
                    for d in host.output_devices()? {
                        if d.name()? == name { return Ok(d); }
                    }
                    return Err(format!("requested device not found: {name}").into());
                }
                host.default_output_device()
                    .ok_or_else(|| "no default output device".into())
            }

            fn build_stream<T>(
                device: &cpal::Device,
                cfg: &cpal::StreamConfig,
                mut engine: StreamingFilterEngine<SignalReplay>,
                noise: Vec<f64>,
                gain: f32,
                err_fn: impl Fn(cpal::StreamError) + Send + 'static,
            ) -> Result<cpal::Stream, Box<dyn Error>>
            where
                T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
            {
                let channels = cfg.channels as usize;
                let mut i = 0usize;

                let stream = device.build_output_stream(
                    cfg,
                    move |output: &mut [T], _| {
                        for frame in output.chunks_mut(channels) {
                            let x = noise[i];
                            i = (i + 1) % noise.len();
                            let y = engine.process(x) as f32 * gain;
                            // unstable designs are allowed; keep the device sane
                            let s = if y.is_finite() { y.clamp(-1.0, 1.0) } else { 0.0 };
                            let v: T = T::from_sample(s);
                            for ch in frame.iter_mut() { *ch = v; }
                        }
                    },
                    err_fn,
                    None,
                )?;
                Ok(stream)
            }

            /// Play filtered noise for `--duration` seconds (default 5).
            pub fn run(d: &FilterDesigner, args: &Args) -> Result<(), Box<dyn Error>> {
                let device  = pick_device(args.device_name.as_deref())?;
                let sup_cfg = device.default_output_config()?;
                let sample_format = sup_cfg.sample_format();
                let cfg = sup_cfg.config();

                let len = (cfg.sample_rate.0 as usize).max(1);
                let noise = SignalReplay::noise(len, 0x0a0d_1710).input().to_vec();
                let engine = StreamingFilterEngine::new(SignalReplay::noise(0, 0), d.current_coefficients().clone());
                let gain = args.gain.unwrap_or(0.35);
                let secs = args.duration_sec.unwrap_or(5);

                println!("Using device: {}", device.name()?);
                println!("Stream config: {:?} (sample_format: {:?})", cfg, sample_format);
                println!("Auditioning filtered noise for {secs} s | Gain: {gain:.2}");

                let err_fn = |e: cpal::StreamError| eprintln!("[cpal] stream error: {e}");

                let stream = match sample_format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, engine, noise, gain, err_fn)?,
                    cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, engine, noise, gain, err_fn)?,
                    cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, engine, noise, gain, err_fn)?,
                    other => return Err(format!("unsupported device sample format: {other:?}").into()),
                };

                stream.play()?;
                std::thread::sleep(Duration::from_secs(secs));
                Ok(())
            }
        }
    } else {
        mod audition {
            use super::Args;
            use std::error::Error;
            use zplane_engine::FilterDesigner;

            pub fn list_output_devices() -> Result<(), Box<dyn Error>> {
                Err("built without the `realtime` feature".into())
            }

            pub fn run(_d: &FilterDesigner, _args: &Args) -> Result<(), Box<dyn Error>> {
                Err("built without the `realtime` feature; rebuild with --features realtime".into())
            }
        }
    }
}
