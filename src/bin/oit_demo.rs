//! Renders a deterministic field of translucent disks through a chosen
//! algorithm, emitting fragments from worker threads, and writes a PNG.
//!
//! Usage: oit_demo [algorithm] [output.png]
//! where algorithm is one of simple, linked_list, loop, loop64, spinlock,
//! interlock, weighted (default spinlock).

use std::thread;

use anyhow::{bail, Context, Result};
use glam::{Vec2, Vec4};

use glassforge::{Algorithm, Fragment, OitConfig, OitRenderer};

const WIDTH: u32 = 512;
const HEIGHT: u32 = 512;
const DISKS: usize = 96;

struct Disk {
    center: Vec2,
    radius: f32,
    depth: f32,
    color: Vec4,
}

/// Golden-angle spiral of overlapping disks; fully deterministic.
fn scene() -> Vec<Disk> {
    (0..DISKS)
        .map(|i| {
            let t = i as f32 / DISKS as f32;
            let angle = i as f32 * 2.399963;
            let orbit = t.sqrt() * 0.42;
            let center = Vec2::new(
                (0.5 + angle.cos() * orbit) * WIDTH as f32,
                (0.5 + angle.sin() * orbit) * HEIGHT as f32,
            );
            // Scramble depths so neighbors interleave in z.
            let depth = 0.05 + 0.9 * ((i * 61) % DISKS) as f32 / DISKS as f32;
            let hue = t * 6.0;
            let color = Vec4::new(
                (hue - 3.0).abs().clamp(0.0, 1.0),
                (2.0 - (hue - 2.0).abs()).clamp(0.0, 1.0),
                (2.0 - (hue - 4.0).abs()).clamp(0.0, 1.0),
                0.45,
            );
            Disk {
                center,
                radius: (0.04 + 0.08 * (1.0 - t)) * WIDTH as f32,
                depth,
                color,
            }
        })
        .collect()
}

fn rasterize(disk: &Disk, mut emit: impl FnMut(u32, u32, f32)) {
    let lo_x = (disk.center.x - disk.radius).floor().max(0.0) as u32;
    let hi_x = ((disk.center.x + disk.radius).ceil() as u32).min(WIDTH - 1);
    let lo_y = (disk.center.y - disk.radius).floor().max(0.0) as u32;
    let hi_y = ((disk.center.y + disk.radius).ceil() as u32).min(HEIGHT - 1);
    for y in lo_y..=hi_y {
        for x in lo_x..=hi_x {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            if p.distance_squared(disk.center) <= disk.radius * disk.radius {
                emit(x, y, disk.depth);
            }
        }
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm> {
    Ok(match name {
        "simple" => Algorithm::Simple,
        "linked_list" => Algorithm::LinkedList,
        "loop" => Algorithm::Loop,
        "loop64" => Algorithm::Loop64,
        "spinlock" => Algorithm::Spinlock,
        "interlock" => Algorithm::Interlock,
        "weighted" => Algorithm::Weighted,
        other => bail!("unknown algorithm '{other}'"),
    })
}

fn emit_pass(renderer: &OitRenderer, disks: &[Disk], depth_only: bool) {
    let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let chunk = disks.len().div_ceil(workers);
    thread::scope(|s| {
        for part in disks.chunks(chunk) {
            s.spawn(move || {
                for disk in part {
                    rasterize(disk, |x, y, depth| {
                        if depth_only {
                            renderer.emit_depth(x, y, depth);
                        } else {
                            renderer.emit(x, y, Fragment::new(disk.color, depth));
                        }
                    });
                }
            });
        }
    });
}

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let algorithm = parse_algorithm(args.get(1).map(String::as_str).unwrap_or("spinlock"))?;
    let output = args.get(2).map(String::as_str).unwrap_or("oit_demo.png");

    let config = OitConfig {
        algorithm,
        width: WIDTH,
        height: HEIGHT,
        ..OitConfig::default()
    };
    let mut renderer = OitRenderer::new(&config)?;
    log::info!("rendering {DISKS} disks with {:?}", renderer.algorithm());

    let disks = scene();
    renderer.begin_frame(Vec4::new(0.08, 0.08, 0.1, 1.0));
    if renderer.needs_depth_pass() {
        emit_pass(&renderer, &disks, true);
    }
    emit_pass(&renderer, &disks, false);
    renderer.resolve();

    let stats = renderer.frame_stats();
    log::info!(
        "{} fragments stored, {} tail-blended, {} discarded",
        stats.stored,
        stats.tail_blended,
        stats.discarded
    );

    let texels: Vec<[u8; 4]> = renderer
        .pixels()
        .into_iter()
        .map(|c| {
            let to8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            [to8(c.x), to8(c.y), to8(c.z), to8(c.w)]
        })
        .collect();
    image::save_buffer(
        output,
        bytemuck::cast_slice(&texels),
        WIDTH,
        HEIGHT,
        image::ExtendedColorType::Rgba8,
    )
    .with_context(|| format!("writing {output}"))?;
    log::info!("wrote {output}");
    Ok(())
}
