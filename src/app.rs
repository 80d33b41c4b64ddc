use std::time;
use std::fs::File;
use std::io::BufReader;

use nalgebra as na;
use na::{point, vector};
use show_image::{WindowOptions, ImageView, ImageInfo, event, create_window};

use tiny_rasterizer::{
    model_rotation_z, perspective, view_translation, Buffers, IndexHandle, PrimitiveKind, Rasterizer, VertexHandle,
};

const EYE: [f32; 3] = [0.0, 0.0, 5.0];
const FOV: f32 = 45.0;
const ASPECT: f32 = 1.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 50.0;
const ROTATION_STEP: f32 = 10.0; // Degrees per key press.

pub struct Params {
    pub width: u32,
    pub height: u32,
    pub rotation: f32,               // Initial model rotation about z, degrees.
    pub output_path: Option<String>, // Write one frame there instead of opening a window.
    pub mesh_path: Option<String>,   // Obj mesh, demo triangle when absent.
    pub workers: usize,              // 0 means one per logical cpu.
    pub wireframe: bool,
    pub depth_view: bool,
}

/// What a key press asks the loop to do.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Exit,
    Rotate(f32),
}

/// Helper, mapping Escape to exit and A/D to rotation.
fn command_from_event(window_event: event::WindowEvent) -> Option<Command> {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        if !event.input.state.is_pressed() {
            return None;
        }
        return match event.input.key_code {
            Some(event::VirtualKeyCode::Escape) => Some(Command::Exit),
            Some(event::VirtualKeyCode::A) => Some(Command::Rotate(ROTATION_STEP)),
            Some(event::VirtualKeyCode::D) => Some(Command::Rotate(-ROTATION_STEP)),
            _ => None,
        };
    }

    return None;
}

fn load_geometry(rasterizer: &mut Rasterizer, params: &Params) -> Result<(VertexHandle, IndexHandle), Box<dyn std::error::Error>> {
    if let Some(path) = &params.mesh_path {
        let handles = rasterizer.load_obj(BufReader::new(File::open(path)?))?;
        log::info!("loaded mesh {}", path);
        return Ok(handles);
    }

    let positions = rasterizer.load_positions(vec![
        point![2.0, 0.0, -2.0],
        point![0.0, 2.0, -2.0],
        point![-2.0, 0.0, -2.0],
    ])?;
    let indices = rasterizer.load_indices(vec![vector![0, 1, 2]])?;
    return Ok((positions, indices));
}

/// Renders one frame with the model rotated by `angle` degrees.
fn render_frame(
    rasterizer: &mut Rasterizer,
    handles: (VertexHandle, IndexHandle),
    angle: f32,
    params: &Params,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let kind = if params.wireframe { PrimitiveKind::Line } else { PrimitiveKind::Triangle };

    rasterizer.clear(Buffers::COLOR | Buffers::DEPTH);
    rasterizer.set_model(model_rotation_z(angle));
    rasterizer.draw(handles.0, handles.1, kind)?;

    if params.depth_view {
        return Ok(rasterizer.depth_to_rgb8());
    }
    return Ok(rasterizer.to_rgb8());
}

/// Sets up the camera and either writes a single frame or launches the window.
pub fn run(params: Params) -> Result<(), Box<dyn std::error::Error>> {
    let mut rasterizer = Rasterizer::with_workers(params.width, params.height, params.workers)?;
    log::info!(
        "rasterizing {}x{} on {} worker(s)",
        params.width,
        params.height,
        rasterizer.workers()
    );

    let handles = load_geometry(&mut rasterizer, &params)?;
    rasterizer.set_view(view_translation(EYE.into()));
    rasterizer.set_projection(perspective(FOV, ASPECT, Z_NEAR, Z_FAR)?);

    if let Some(path) = &params.output_path {
        let data = render_frame(&mut rasterizer, handles, params.rotation, &params)?;
        let image = image::RgbImage::from_raw(params.width, params.height, data)
            .ok_or("frame data does not match the image size")?;
        image.save(path)?;
        log::info!("frame written to {}", path);
        return Ok(());
    }

    let window_options: WindowOptions = WindowOptions {
        size: Some([params.width, params.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;

    let mut angle = params.rotation;
    let mut frame_count: u64 = 0;
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    loop {
        let data = render_frame(&mut rasterizer, handles, angle, &params)?;
        let image_data = ImageView::new(ImageInfo::rgb8(params.width, params.height), &data);
        window.set_image("image", image_data)?;
        frame_count += 1;

        // Draining everything that piled up in the event channel since the last frame.
        let mut exit = false;
        for command in event_channel.try_iter().filter_map(command_from_event) {
            match command {
                Command::Exit => exit = true,
                Command::Rotate(step) => angle += step,
            }
        }
        if exit {
            break;
        }

        frame_counter += 1;
        if time::Instant::now()
        .duration_since(frame_counter_time_begin)
        .as_secs_f32() > 1.0 {
            log::info!("fps {}, frame count: {}", frame_counter, frame_count);
            frame_counter_time_begin = time::Instant::now();
            frame_counter = 0;
        }
    }

    log::info!("exiting after {} frames", frame_count);
    return Ok(());
}
