use super::*;

/// Texture-to-buffer copies need rows aligned to this many bytes.
const COPY_ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// `(unpadded, padded)` bytes per row for a copy of `width` pixels.
fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> (u32, u32) {
    let unpadded = width * bytes_per_pixel;
    let padded = unpadded.div_ceil(COPY_ROW_ALIGNMENT) * COPY_ROW_ALIGNMENT;
    (unpadded, padded)
}

fn copy_padded_rows(data: &[u8], height: u32, unpadded: u32, padded: u32, output: &mut Vec<u8>) {
    output.clear();
    output.reserve((unpadded * height) as usize);
    for row in 0..height {
        let start = (row * padded) as usize;
        output.extend_from_slice(&data[start..start + unpadded as usize]);
    }
}

fn map_buffer(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<u8>, CanvasError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        if sender.send(result).is_err() {
            warn!("readback receiver dropped before the buffer was mapped");
        }
    });
    let _ = device.poll(wgpu::MaintainBase::Wait);

    receiver
        .recv()
        .map_err(|error| CanvasError::Gpu(format!("readback channel closed: {error}")))?
        .map_err(|error| CanvasError::Gpu(format!("failed to map readback buffer: {error}")))?;
    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(bytes)
}

/// Reads the whole texture as tightly packed RGBA bytes.
pub(super) fn read_texture(ctx: &GpuContext, texture: &GpuTexture) -> Result<Vec<u8>, CanvasError> {
    let (width, height) = (texture.width(), texture.height());
    let (unpadded, padded) = padded_bytes_per_row(width, 4);
    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("canvas_readback_buffer"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("canvas_readback_encoder"),
        });
    encoder.copy_texture_to_buffer(
        texture.raw().as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let data = map_buffer(&ctx.device, &buffer)?;
    let mut output = Vec::new();
    copy_padded_rows(&data, height, unpadded, padded, &mut output);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_the_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64, 4), (256, 256));
        assert_eq!(padded_bytes_per_row(3, 4), (12, 256));
        assert_eq!(padded_bytes_per_row(65, 4), (260, 512));
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let data = vec![1, 2, 3, 4, 9, 9, 9, 9, 5, 6, 7, 8, 8, 8, 8, 8];
        let mut output = Vec::new();
        copy_padded_rows(&data, 2, 4, 8, &mut output);
        assert_eq!(output, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn unpadded_rows_copy_through() {
        let data = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let mut output = vec![0xAA];
        copy_padded_rows(&data, 2, 4, 4, &mut output);
        assert_eq!(output, data);
    }
}
