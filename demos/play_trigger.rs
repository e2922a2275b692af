use anyhow::Context;
use mixcore::{
    Pose, RequestId, SoftwareMixer, SoundEngine, SoundEngineDesc, SoundEvent, TriggerDesc,
    TriggerOutcome, Vec3, backend::OutputStream,
};
use std::time::{Duration, Instant};

/// Plays a sound file from an object circling the listener.
///
/// Usage: `cargo run --example play_trigger --features output -- <file>`
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: play_trigger <audio file>")?;

    let desc = SoundEngineDesc::default().block_size(1024).channel_count(32);
    let mixer = SoftwareMixer::new(desc.channel_count, desc.sample_rate);
    let mut engine = SoundEngine::init(desc.clone(), mixer.clone())?;
    let mut output = OutputStream::new(desc, mixer);
    output.start()?;

    let sample = engine.load_sample(&path, false);
    anyhow::ensure!(sample.is_valid(), "could not decode {}", path);

    let trigger = engine.create_trigger(
        &TriggerDesc::new("start", path.as_str())
            .attenuation(1.0, 20.0)
            .panning(true)
            .loop_count(0)
            .fade_in(0.5)
            .fade_out(1.0),
    );
    let stop = engine.create_trigger(&TriggerDesc::new("stop", path.as_str()));

    let object = engine.register_object(Pose::from_position(Vec3::new(0.0, 0.0, -5.0)));
    let TriggerOutcome::Started(instance) =
        engine.execute_trigger(object, trigger, RequestId(1))?
    else {
        anyhow::bail!("start trigger did not start");
    };
    log::info!("Started instance {}", instance);

    let started = Instant::now();
    let mut stopping = false;
    loop {
        let t = started.elapsed().as_secs_f32();
        let position = Vec3::new(t.sin() * 8.0, 0.0, -t.cos() * 8.0);
        engine.set_object_pose(object, Pose::from_position(position))?;

        if t > 8.0 && !stopping {
            engine.execute_trigger(object, stop, RequestId(2))?;
            stopping = true;
        }

        engine.update();
        let events = engine.poll_events();
        for event in &events {
            log::info!("{:?}", event);
        }
        if events
            .iter()
            .any(|e| matches!(e, SoundEvent::TriggerFinished { .. }))
        {
            break;
        }

        std::thread::sleep(Duration::from_millis(16));
    }

    log::info!("Processed {} frames", output.frames_processed());
    output.stop();
    engine.release();
    Ok(())
}
