//! Volcanic and impact craters: a shaded disc sized by `diameter`, darkest
//! at the rim and lit from above.

use crate::color::Color;
use crate::drawing::{Paint, PaintStyle, Primitive, RadialGradient};
use crate::entity::Entity;
use crate::geometry::Point;
use crate::tags::get_length;

use super::{GeneratorContext, GeneratorDirective};

const CRATER_OPACITY: f64 = 0.2;
const FLOOR_OPACITY: f64 = 0.2;
const RIM_OPACITY: f64 = 1.0;

/// The gradient center sits this fraction of the radius below the crater
/// center.
const LIGHT_SHIFT: f64 = 1.0 / 7.0;

/// Nothing is drawn without a positive `diameter` in metres.
pub fn generate(
    directive: &GeneratorDirective,
    entity: &Entity,
    context: &GeneratorContext<'_>,
) -> Vec<Primitive> {
    let Some(anchor) = entity.anchor() else {
        return Vec::new();
    };
    let Some(diameter) = get_length(&directive.inputs, "diameter").filter(|value| *value > 0.0)
    else {
        return Vec::new();
    };

    let flinger = context.flinger;
    let center = flinger.fling(anchor);
    let radius = diameter / 2.0 * flinger.scale(anchor);
    vec![Primitive::Circle {
        center,
        radius,
        style: PaintStyle {
            fill: Paint::Radial(RadialGradient {
                center: center + Point::new(0.0, radius * LIGHT_SHIFT),
                radius,
                color: directive.params.color.unwrap_or(Color::rgb(0, 0, 0)),
                inner_opacity: FLOOR_OPACITY,
                outer_opacity: RIM_OPACITY,
            }),
            ..Default::default()
        }
        .with_opacity(CRATER_OPACITY),
    }]
}
