//! Path commands and the SVG path-data subset used by shape definitions.

use std::fmt;

use crate::geometry::Point;

/// One absolute path command.
#[derive(Clone, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    ArcTo {
        radii: Point,
        rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
    Close,
}

impl PathCommand {
    /// Applies `f` to every point of the command.
    pub fn map_points(&self, f: impl Fn(Point) -> Point) -> PathCommand {
        match self {
            PathCommand::MoveTo(p) => PathCommand::MoveTo(f(*p)),
            PathCommand::LineTo(p) => PathCommand::LineTo(f(*p)),
            PathCommand::QuadTo(c, p) => PathCommand::QuadTo(f(*c), f(*p)),
            PathCommand::CubicTo(c1, c2, p) => PathCommand::CubicTo(f(*c1), f(*c2), f(*p)),
            PathCommand::ArcTo {
                radii,
                rotation,
                large_arc,
                sweep,
                to,
            } => PathCommand::ArcTo {
                radii: *radii,
                rotation: *rotation,
                large_arc: *large_arc,
                sweep: *sweep,
                to: f(*to),
            },
            PathCommand::Close => PathCommand::Close,
        }
    }

    pub fn translate(&self, by: Point) -> PathCommand {
        self.map_points(|p| p + by)
    }

    /// Mirrors the command around the vertical line `x = axis`. Arcs change
    /// their sweep direction.
    pub fn mirror(&self, axis: f64) -> PathCommand {
        let mirrored = self.map_points(|p| Point::new(2.0 * axis - p.x, p.y));
        match mirrored {
            PathCommand::ArcTo {
                radii,
                rotation,
                large_arc,
                sweep,
                to,
            } => PathCommand::ArcTo {
                radii,
                rotation: -rotation,
                large_arc,
                sweep: !sweep,
                to,
            },
            other => other,
        }
    }
}

/// Path data in SVG syntax, ready for an SVG backend.
pub struct PathData<'a>(pub &'a [PathCommand]);

impl fmt::Display for PathData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match command {
                PathCommand::MoveTo(p) => write!(f, "M {},{}", p.x, p.y)?,
                PathCommand::LineTo(p) => write!(f, "L {},{}", p.x, p.y)?,
                PathCommand::QuadTo(c, p) => write!(f, "Q {},{} {},{}", c.x, c.y, p.x, p.y)?,
                PathCommand::CubicTo(c1, c2, p) => write!(
                    f,
                    "C {},{} {},{} {},{}",
                    c1.x, c1.y, c2.x, c2.y, p.x, p.y
                )?,
                PathCommand::ArcTo {
                    radii,
                    rotation,
                    large_arc,
                    sweep,
                    to,
                } => write!(
                    f,
                    "A {} {} {} {} {} {},{}",
                    radii.x,
                    radii.y,
                    rotation,
                    *large_arc as u8,
                    *sweep as u8,
                    to.x,
                    to.y
                )?,
                PathCommand::Close => write!(f, "Z")?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("unexpected character `{0}`")]
    UnexpectedCharacter(char),
    #[error("command `{0}` is missing arguments")]
    MissingArguments(char),
    #[error("path data must start with a move command")]
    NoMoveTo,
}

enum Token {
    Command(char),
    Number(f64),
}

fn tokenize(data: &str) -> Result<Vec<Token>, PathError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = data.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == ',' {
            i += 1;
        } else if "MmLlHhVvQqCcAaZz".contains(c) {
            tokens.push(Token::Command(c));
            i += 1;
        } else if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' {
            let start = i;
            i += 1;
            let mut seen_dot = c == '.';
            let mut seen_exponent = false;
            while i < chars.len() {
                let d = chars[i];
                if d.is_ascii_digit() {
                    i += 1;
                } else if d == '.' && !seen_dot && !seen_exponent {
                    seen_dot = true;
                    i += 1;
                } else if (d == 'e' || d == 'E') && !seen_exponent {
                    seen_exponent = true;
                    i += 1;
                    if i < chars.len() && (chars[i] == '-' || chars[i] == '+') {
                        i += 1;
                    }
                } else {
                    break;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| PathError::UnexpectedCharacter(c))?;
            tokens.push(Token::Number(number));
        } else {
            return Err(PathError::UnexpectedCharacter(c));
        }
    }

    Ok(tokens)
}

fn arity(command: char) -> usize {
    match command.to_ascii_uppercase() {
        'M' | 'L' => 2,
        'H' | 'V' => 1,
        'Q' => 4,
        'C' => 6,
        'A' => 7,
        _ => 0,
    }
}

/// Parses SVG path data (`M`, `L`, `H`, `V`, `Q`, `C`, `A`, `Z`, absolute and
/// relative) into absolute commands.
pub fn parse_path(data: &str) -> Result<Vec<PathCommand>, PathError> {
    let tokens = tokenize(data)?;
    let mut commands = Vec::new();
    let mut current = Point::default();
    let mut subpath_start = Point::default();
    let mut command: Option<char> = None;
    let mut i = 0;

    while i < tokens.len() {
        let letter = match tokens[i] {
            Token::Command(letter) => {
                i += 1;
                letter
            }
            // repeated arguments reuse the previous command; a repeated move
            // is an implicit line
            Token::Number(_) => match command {
                Some('M') => 'L',
                Some('m') => 'l',
                Some(letter) if arity(letter) > 0 => letter,
                _ => return Err(PathError::NoMoveTo),
            },
        };
        if commands.is_empty() && letter != 'M' && letter != 'm' {
            return Err(PathError::NoMoveTo);
        }

        let count = arity(letter);
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            match tokens.get(i) {
                Some(Token::Number(number)) => args.push(*number),
                _ => return Err(PathError::MissingArguments(letter)),
            }
            i += 1;
        }

        let relative = letter.is_ascii_lowercase();
        let base = if relative { current } else { Point::default() };
        let point = |x: f64, y: f64| Point::new(x, y) + base;

        let next = match letter.to_ascii_uppercase() {
            'M' => {
                current = point(args[0], args[1]);
                subpath_start = current;
                PathCommand::MoveTo(current)
            }
            'L' => {
                current = point(args[0], args[1]);
                PathCommand::LineTo(current)
            }
            'H' => {
                let x = if relative { current.x + args[0] } else { args[0] };
                current = Point::new(x, current.y);
                PathCommand::LineTo(current)
            }
            'V' => {
                let y = if relative { current.y + args[0] } else { args[0] };
                current = Point::new(current.x, y);
                PathCommand::LineTo(current)
            }
            'Q' => {
                let control = point(args[0], args[1]);
                current = point(args[2], args[3]);
                PathCommand::QuadTo(control, current)
            }
            'C' => {
                let control_1 = point(args[0], args[1]);
                let control_2 = point(args[2], args[3]);
                current = point(args[4], args[5]);
                PathCommand::CubicTo(control_1, control_2, current)
            }
            'A' => {
                current = point(args[5], args[6]);
                PathCommand::ArcTo {
                    radii: Point::new(args[0], args[1]),
                    rotation: args[2],
                    large_arc: args[3] != 0.0,
                    sweep: args[4] != 0.0,
                    to: current,
                }
            }
            _ => {
                current = subpath_start;
                PathCommand::Close
            }
        };
        commands.push(next);
        command = Some(letter);
    }

    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relative_and_implicit_commands() {
        let commands = parse_path("m 1 2 3 0 v 4 h-3 z").unwrap();
        assert_eq!(
            vec![
                PathCommand::MoveTo(Point::new(1.0, 2.0)),
                PathCommand::LineTo(Point::new(4.0, 2.0)),
                PathCommand::LineTo(Point::new(4.0, 6.0)),
                PathCommand::LineTo(Point::new(1.0, 6.0)),
                PathCommand::Close,
            ],
            commands
        );
    }

    #[test]
    fn test_parse_arc_and_exponent() {
        let commands = parse_path("M7,4 A3 3 0 1 1 7,10 L1e1,-.5").unwrap();
        assert_eq!(3, commands.len());
        assert_eq!(PathCommand::LineTo(Point::new(10.0, -0.5)), commands[2]);
        match &commands[1] {
            PathCommand::ArcTo { large_arc, sweep, to, .. } => {
                assert!(*large_arc && *sweep);
                assert_eq!(Point::new(7.0, 10.0), *to);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Err(PathError::NoMoveTo), parse_path("L 1 1"));
        assert_eq!(Err(PathError::MissingArguments('L')), parse_path("M 0 0 L 1"));
        assert_eq!(Err(PathError::UnexpectedCharacter('X')), parse_path("M 0 0 X"));
    }

    #[test]
    fn test_mirror_flips_arc_sweep() {
        let arc = PathCommand::ArcTo {
            radii: Point::new(2.0, 2.0),
            rotation: 0.0,
            large_arc: false,
            sweep: true,
            to: Point::new(10.0, 3.0),
        };
        match arc.mirror(7.0) {
            PathCommand::ArcTo { sweep, to, .. } => {
                assert!(!sweep);
                assert_eq!(Point::new(4.0, 3.0), to);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_path_data_round_trip() {
        let commands = parse_path("M 0 0 L 2 0 L 2 2 Z").unwrap();
        let text = PathData(&commands).to_string();
        assert_eq!("M 0,0 L 2,0 L 2,2 Z", text);
        assert_eq!(commands, parse_path(&text).unwrap());
    }
}
