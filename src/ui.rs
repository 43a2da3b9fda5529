//! Generic editor.
//!
//! There is no custom panel: every parameter is listed with its label, current
//! value and range (choice list for the ratio), the same view a host would
//! render on its own.

use crate::CompressorParams;
use nih_plug_vizia::vizia::prelude::*;
use nih_plug_vizia::widgets::*;
use nih_plug_vizia::ViziaState;
use std::sync::Arc;

const EDITOR_WIDTH: u32 = 380;
const EDITOR_HEIGHT: u32 = 260;

#[derive(Lens, Clone)]
pub struct EditorData {
    pub params: Arc<CompressorParams>,
}

impl Model for EditorData {}

pub fn default_state() -> Arc<ViziaState> {
    ViziaState::new(|| (EDITOR_WIDTH, EDITOR_HEIGHT))
}

pub fn build_ui(cx: &mut Context, params: Arc<CompressorParams>) {
    EditorData { params }.build(cx);

    VStack::new(cx, |cx| {
        Label::new(cx, "MultiBand Compressor")
            .font_size(20.0)
            .height(Pixels(36.0))
            .child_top(Stretch(1.0))
            .child_bottom(Pixels(4.0));

        ScrollView::new(cx, 0.0, 0.0, false, true, |cx| {
            GenericUi::new(cx, EditorData::params)
                .width(Percentage(100.0))
                .height(Auto)
                .child_top(Pixels(5.0))
                .child_right(Pixels(10.0));
        })
        .width(Percentage(100.0));
    })
    .row_between(Pixels(0.0))
    .child_left(Pixels(10.0))
    .child_right(Pixels(10.0));

    ResizeHandle::new(cx);
}
