use super::*;

impl<B: Backend> Canvas<B> {
    /// Replays `buffer` against the canvas. Stops at the first error.
    pub(super) fn render_stream(&mut self, buffer: CommandBuffer) -> Result<(), CanvasError> {
        let mut reader = buffer.into_reader();
        while let Some(command) = reader.next_command()? {
            trace!(command = command.name(), offset = reader.position(), "canvas command");
            self.apply_command(command)?;
        }
        Ok(())
    }

    fn apply_command(&mut self, command: Command) -> Result<(), CanvasError> {
        let state = &mut self.state;
        match command {
            Command::PathStart => state.path.reset(),
            Command::MoveTo(x, y) => state.path.move_to(x, y),
            Command::LineTo(x, y) => state.path.line_to(x, y),
            Command::QuadTo([cx, cy, x, y]) => state.path.quad_to(cx, cy, x, y),
            Command::CubicTo([c1x, c1y, c2x, c2y, x, y]) => state.path.cubic_to(c1x, c1y, c2x, c2y, x, y),
            Command::ClosePath => state.path.close(),
            Command::PathEnd => {}

            Command::PushClip(path) => self.push_clip(path)?,
            Command::PopClip => self.pop_clip(),

            Command::SetArcType(arc_type) => state.arc_type = arc_type,
            Command::SetTransform([mxx, mxy, mxt, myx, myy, myt]) => {
                state.set_transform(transform_from_components(mxx, mxy, mxt, myx, myy, myt));
            }
            Command::SetGlobalAlpha(alpha) => state.global_alpha = alpha.clamp(0.0, 1.0),
            Command::SetFillRule(rule) => state.fill_rule = rule,
            Command::SetBlendMode(mode) => state.blend_mode = mode,
            Command::SetFillPaint(paint) => state.fill_paint = paint,
            Command::SetStrokePaint(paint) => state.stroke_paint = paint,
            Command::SetLineWidth(width) => state.set_line_width(width),
            Command::SetLineCap(cap) => state.set_line_cap(cap),
            Command::SetLineJoin(join) => state.set_line_join(join),
            Command::SetMiterLimit(limit) => state.set_miter_limit(limit),
            Command::SetFont(font) => state.font = font,
            Command::SetTextAlign(align) => state.text_align = align,
            Command::SetTextBaseline(baseline) => state.text_baseline = baseline,
            Command::SetEffect(effect) => {
                if let Some(effect) = effect.as_ref() {
                    effect.validate()?;
                }
                state.effect = effect;
            }

            Command::PutArgb { x, y, argb } => {
                let pixel = Color::from_argb(argb).to_argb_pre();
                let texture = self.backend.create_texture(1, 1, &[pixel])?;
                self.put_texture(&texture, x, y, 1, 1)?;
            }
            Command::PutArgbPreBuf {
                x,
                y,
                width,
                height,
                bgra_pre,
            } => {
                if width > 0 && height > 0 {
                    let image = Image::from_bgra_pre_bytes(width as u32, height as u32, &bgra_pre)?;
                    let texture = self
                        .backend
                        .create_texture(image.width(), image.height(), image.pixels())?;
                    self.put_texture(&texture, x, y, width, height)?;
                }
            }
            Command::ApplyEffect(Some(effect)) => self.apply_canvas_effect(&effect)?,
            Command::ApplyEffect(None) => {}

            Command::Render(op) => self.render_op(&op)?,
        }
        Ok(())
    }

    /// Replaces a block of primary-buffer pixels, ignoring transform, alpha,
    /// clip and blend mode.
    fn put_texture(&mut self, texture: &B::Texture, x: i32, y: i32, width: i32, height: i32) -> Result<(), CanvasError> {
        let g = self.cv.graphics()?;
        g.set_transform(Transform::identity());
        g.set_extra_alpha(1.0);
        g.set_composite_mode(CompositeMode::Src);
        g.draw_texture(
            texture,
            IRect::new(x, y, width, height).to_box(),
            IRect::new(0, 0, width, height).to_box(),
        );
        g.set_composite_mode(CompositeMode::SrcOver);
        Ok(())
    }

    /// Draws one op, routing it through the temporary buffer when a clip or
    /// a non-default blend mode has to be applied afterwards.
    fn render_op(&mut self, op: &RenderOp) -> Result<(), CanvasError> {
        let (width, height) = (self.width, self.height);
        let clipped = !self.clip.is_empty();
        let blend = self.state.blend_mode;
        let to_temp = clipped || blend != BlendMode::SrcOver;
        let dest = if to_temp { BufferId::Temp } else { BufferId::Canvas };

        if clipped {
            // The mask rebuild uses the temporary buffer as scratch, so it
            // must happen before the op lands there.
            self.init_clip()?;
        }
        if to_temp {
            let reallocated = self.temp.validate(&mut self.backend, width, height)?;
            self.count_reallocation(reallocated);
        }

        let mut bounds = None;
        if let Some(effect) = self.state.effect.clone() {
            let measured = {
                let mut res = OpResources {
                    backend: &mut self.backend,
                    images: &mut self.images,
                    text: &mut self.text,
                };
                execute_op(op, &mut self.state, &mut res, ExecMode::Measure)?
            };
            if let Some(measured) = measured {
                let written = self.render_with_effect(&effect, op, measured, dest)?;
                if to_temp {
                    bounds = Some(written);
                }
            }
        } else {
            let g = match dest {
                BufferId::Temp => self.temp.graphics()?,
                _ => self.cv.graphics()?,
            };
            g.set_transform(*self.state.transform());
            g.set_extra_alpha(self.state.global_alpha);
            g.set_composite_mode(CompositeMode::SrcOver);
            let mode = if to_temp { ExecMode::Both(g) } else { ExecMode::Render(g) };
            let mut res = OpResources {
                backend: &mut self.backend,
                images: &mut self.images,
                text: &mut self.text,
            };
            let measured = execute_op(op, &mut self.state, &mut res, mode)?;
            if to_temp {
                bounds = measured.map(|b| IRect::round_out(&b));
            }
        }
        #[cfg(feature = "render_metrics")]
        {
            self.frame_metrics.ops_executed += 1;
        }

        if !to_temp {
            return Ok(());
        }
        let Some(bounds) = bounds.map(|b| b.intersect(&self.device_clip())) else {
            return Ok(());
        };
        if bounds.is_empty() {
            return Ok(());
        }

        if clipped {
            let (comp, into) = if blend == BlendMode::SrcOver {
                (CompositeMode::SrcOver, BufferId::Canvas)
            } else {
                (CompositeMode::Src, BufferId::Temp)
            };
            self.composite(BufferId::Temp, BlendMode::SrcIn, BufferId::Clip, Some(bounds), comp, into)?;
        }
        if blend != BlendMode::SrcOver {
            self.composite(
                BufferId::Temp,
                blend,
                BufferId::Canvas,
                Some(bounds),
                CompositeMode::Src,
                BufferId::Canvas,
            )?;
        }
        Ok(())
    }
}
