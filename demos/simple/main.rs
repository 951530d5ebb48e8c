use confidence::{ClientConfig, ConfidenceProvider, EvaluationContext, FlagProvider};
use tokio_util::sync::CancellationToken;

#[tokio::main]
pub async fn main() -> confidence::Result<()> {
    // Configure env_logger to see Confidence SDK logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("confidence")).init();

    let client_secret = std::env::var("CONFIDENCE_CLIENT_SECRET")
        .expect("CONFIDENCE_CLIENT_SECRET env variable should contain client secret");
    let client = ClientConfig::from_client_secret(client_secret)
        .assignment_logger(|event| {
            println!("Logging assignment event: {:?}", event);
        })
        .to_client()?;

    let provider = ConfidenceProvider::new(client).with_warm_up(["a-boolean-flag"]);

    // Until initialization succeeds, the provider serves default values for all flags.
    if let Err(err) = provider
        .initialize(EvaluationContext::default().with_attribute("app", "demo"))
        .await
    {
        println!("error initializing provider: {:?}", err);
    }

    let outcome = provider
        .resolve_boolean(
            "a-boolean-flag.enabled",
            false,
            &EvaluationContext::new("test-subject"),
            &CancellationToken::new(),
        )
        .await;

    println!("Resolution: {:?}", outcome);

    provider.shutdown();

    Ok(())
}
