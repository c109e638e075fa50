// Prints what the pipeline sees for library files

use std::path::PathBuf;

use clap::Parser;
use clipcrop::media::{AssetId, FfprobeMediaStore, MediaSource, TrackKind};

#[derive(Parser)]
#[command(name = "probe_asset", about = "Show the tracks clipcrop finds in library files")]
struct Args {
    /// Directory holding the media library
    #[arg(short, long, default_value = ".")]
    library: PathBuf,

    /// ffprobe binary
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// Asset names inside the library
    #[arg(required = true)]
    assets: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args = Args::parse();
    let store = FfprobeMediaStore::new(&args.library, &args.ffprobe);

    for name in &args.assets {
        let id = AssetId::from(name.as_str());
        println!("\n🎬 {}", id);

        let media = match store.probe(&id).await {
            Ok(media) => media,
            Err(e) => {
                println!("   ❌ {}", e.user_message());
                continue;
            }
        };

        println!("   Location: {:?}", media.location());
        println!("   Duration: {:.2}s", media.duration());
        println!(
            "   Natural size: {}x{}",
            media.asset.natural_size.width, media.asset.natural_size.height
        );

        for track in media.tracks(TrackKind::Video)? {
            let oriented = track.natural_size.applying(&track.preferred_transform);
            println!(
                "   🎞️  video #{}: {}x{} natural, {}x{} oriented, {:.2}s",
                track.track_id,
                track.natural_size.width,
                track.natural_size.height,
                oriented.width.abs(),
                oriented.height.abs(),
                track.time_range.duration
            );
        }

        let audio = media.tracks(TrackKind::Audio)?;
        if audio.is_empty() {
            println!("   🔇 no audio");
        }
        for track in audio {
            println!("   🔊 audio #{}: {:.2}s", track.track_id, track.time_range.duration);
        }
    }

    Ok(())
}
