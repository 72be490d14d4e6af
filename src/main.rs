use std::sync::Arc;
use tower_http::services::ServeDir;

use guidance_engine::adapters::{
    camera::DeviceCamera,
    haptics::LogHaptics,
    http::{router, state::HttpState},
    speech::{piper::PiperSpeech, LogSpeech},
};
use guidance_engine::application::{ports::SpeechPort, services::GuidanceService};
use guidance_engine::domain::config::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Inicializar logs (RUST_LOG=info por defecto)
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    // 2. Configuración (GUIDANCE_CONFIG o valores por defecto)
    let config = EngineConfig::from_env()?;
    tracing::info!("🔧 Configuración cargada: {:?}", config.camera.source);

    // 3. Adaptadores de salida
    let piper = PiperSpeech::new(&config.speech);
    let speech: Arc<dyn SpeechPort> = if piper.is_available() {
        Arc::new(piper)
    } else {
        tracing::warn!("Piper no disponible en {}; la voz sólo irá al log.", config.speech.piper_path);
        Arc::new(LogSpeech)
    };

    // 4. Servicio de guiado
    let guidance = Arc::new(GuidanceService::new(
        config.clone(),
        Arc::new(DeviceCamera),
        speech,
        Arc::new(LogHaptics),
    ));

    let state = HttpState { guidance: guidance.clone() };
    let app = router(state).fallback_service(ServeDir::new(&config.server.static_dir));

    // 5. Lanzar el servidor
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("🚀 Servidor de guiado iniciado en http://{}", config.server.bind);
    tracing::info!("📂 Archivos estáticos servidos desde '{}'", config.server.static_dir);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Señal de parada recibida.");
        })
        .await?;

    // Liberar cámara y voz si quedaba una sesión abierta.
    if guidance.is_running().await {
        guidance.stop().await?;
    }
    Ok(())
}
