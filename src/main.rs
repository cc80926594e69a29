use belated::{trace_init, Arrive, Countdown, Runtime, Settings};

#[tokio::main]
async fn main() -> Arrive<()> {
    trace_init();
    let settings = Settings::load();
    let countdown = Countdown::from(&settings);
    let clock = Runtime::new(countdown).run().await?;
    tracing::info!("Finished after {} ticks.", clock.ticks());
    Ok(())
}
