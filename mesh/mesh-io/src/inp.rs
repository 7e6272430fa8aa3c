//! Abaqus-style input deck reader for tetrahedral tissue models.
//!
//! Only the subset needed to assign materials is read:
//!
//! - `*PART, NAME=...` / `*END PART` scopes (ids are local to a part)
//! - `*NODE` coordinate blocks
//! - `*ELEMENT, TYPE=C3D4|C3D10[, ELSET=...]` blocks (first four nodes kept)
//! - `*ELSET` and `*NSET`, including the `GENERATE` form
//!
//! Every element defined inside a part is also added to an element set named
//! after the part, so part-name filters work on element sets alone.
//! Unsupported element types are skipped and counted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hashbrown::HashMap;
use mesh_types::{Point3, TetMesh};

use crate::error::{IoError, IoResult};

/// A parsed input deck.
#[derive(Debug, Clone, Default)]
pub struct InpModel {
    /// Tetrahedral mesh with element and node sets.
    pub mesh: TetMesh,
    /// Part names in order of appearance.
    pub parts: Vec<String>,
    /// Elements of unsupported types that were skipped.
    pub skipped_elements: usize,
}

/// Load a tetrahedral model from an input deck.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a data line is malformed,
/// or an element or set references an id that was never defined.
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_inp;
///
/// let model = load_inp("tissue.inp").unwrap();
/// println!("{} tetrahedra in {} parts", model.mesh.element_count(), model.parts.len());
/// ```
pub fn load_inp<P: AsRef<Path>>(path: P) -> IoResult<InpModel> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::from_open(e, path))?;
    parse_inp(BufReader::new(file))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    None,
    Node,
    Element { tet: bool, elset: Option<String> },
    Elset { name: String, generate: bool },
    Nset { name: String, generate: bool },
}

#[derive(Default)]
struct Scope {
    part: Option<String>,
    nodes: HashMap<u64, usize>,
    elements: HashMap<u64, usize>,
}

struct Parser {
    model: InpModel,
    scope: Scope,
    block: Block,
}

/// Parse an input deck from any buffered reader.
///
/// # Errors
///
/// See [`load_inp`].
pub fn parse_inp<R: BufRead>(reader: R) -> IoResult<InpModel> {
    let mut parser = Parser {
        model: InpModel::default(),
        scope: Scope::default(),
        block: Block::None,
    };

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("**") {
            continue;
        }
        if let Some(keyword) = trimmed.strip_prefix('*') {
            parser.keyword(keyword);
        } else {
            parser
                .data(trimmed)
                .map_err(|e| match e {
                    IoError::InvalidContent { message } => IoError::invalid_content(format!(
                        "line {}: {message}",
                        line_no + 1
                    )),
                    other => other,
                })?;
        }
    }

    Ok(parser.model)
}

/// Split `*KEY, A=1, B` into the upper-cased keyword and its options.
fn split_keyword(line: &str) -> (String, Vec<(String, Option<String>)>) {
    let mut parts = line.split(',');
    let name = parts.next().unwrap_or_default().trim().to_ascii_uppercase();
    let options = parts
        .map(|opt| {
            let mut kv = opt.splitn(2, '=');
            let key = kv.next().unwrap_or_default().trim().to_ascii_uppercase();
            let value = kv.next().map(|v| v.trim().to_string());
            (key, value)
        })
        .collect();
    (name, options)
}

fn option<'a>(options: &'a [(String, Option<String>)], key: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.as_deref())
}

fn has_flag(options: &[(String, Option<String>)], key: &str) -> bool {
    options.iter().any(|(k, _)| k == key)
}

impl Parser {
    fn keyword(&mut self, line: &str) {
        let (name, options) = split_keyword(line);
        self.block = match name.as_str() {
            "PART" => {
                let part = option(&options, "NAME").unwrap_or("PART").to_string();
                self.model.parts.push(part.clone());
                self.scope = Scope {
                    part: Some(part),
                    ..Scope::default()
                };
                Block::None
            }
            "END PART" => {
                self.scope = Scope::default();
                Block::None
            }
            "NODE" => Block::Node,
            "ELEMENT" => {
                let kind = option(&options, "TYPE").unwrap_or_default().to_ascii_uppercase();
                Block::Element {
                    tet: kind.starts_with("C3D4") || kind.starts_with("C3D10"),
                    elset: option(&options, "ELSET").map(str::to_string),
                }
            }
            "ELSET" => Block::Elset {
                name: option(&options, "ELSET").unwrap_or_default().to_string(),
                generate: has_flag(&options, "GENERATE"),
            },
            "NSET" => Block::Nset {
                name: option(&options, "NSET").unwrap_or_default().to_string(),
                generate: has_flag(&options, "GENERATE"),
            },
            _ => Block::None,
        };
    }

    fn data(&mut self, line: &str) -> IoResult<()> {
        match self.block.clone() {
            Block::None => Ok(()),
            Block::Node => self.node(line),
            Block::Element { tet, elset } => self.element(line, tet, elset.as_deref()),
            Block::Elset { name, generate } => {
                let ids = ids_on_line(line, generate)?;
                for id in ids {
                    let index = *self.scope.elements.get(&id).ok_or_else(|| IoError::UnknownId {
                        keyword: format!("ELSET {name}"),
                        id,
                    })?;
                    self.model.mesh.element_sets.entry(name.clone()).or_default().push(index);
                }
                Ok(())
            }
            Block::Nset { name, generate } => {
                let ids = ids_on_line(line, generate)?;
                for id in ids {
                    let index = *self.scope.nodes.get(&id).ok_or_else(|| IoError::UnknownId {
                        keyword: format!("NSET {name}"),
                        id,
                    })?;
                    self.model.mesh.node_sets.entry(name.clone()).or_default().push(index);
                }
                Ok(())
            }
        }
    }

    fn node(&mut self, line: &str) -> IoResult<()> {
        let fields = fields(line);
        if fields.len() < 4 {
            return Err(IoError::invalid_content("node line needs an id and 3 coordinates"));
        }
        let id = parse_id(fields[0])?;
        let coord = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| IoError::invalid_content(format!("bad coordinate '{s}'")))
        };
        let p = Point3::new(coord(fields[1])?, coord(fields[2])?, coord(fields[3])?);
        self.scope.nodes.insert(id, self.model.mesh.nodes.len());
        self.model.mesh.nodes.push(p);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)] // node counts stay below u32::MAX
    fn element(&mut self, line: &str, tet: bool, elset: Option<&str>) -> IoResult<()> {
        if !tet {
            self.model.skipped_elements += 1;
            return Ok(());
        }
        let fields = fields(line);
        if fields.len() < 5 {
            return Err(IoError::invalid_content("tetrahedron needs an id and 4 nodes"));
        }
        let id = parse_id(fields[0])?;
        let mut corners = [0u32; 4];
        for (slot, field) in corners.iter_mut().zip(&fields[1..5]) {
            let node_id = parse_id(field)?;
            let index = *self.scope.nodes.get(&node_id).ok_or_else(|| IoError::UnknownId {
                keyword: "ELEMENT".to_string(),
                id: node_id,
            })?;
            *slot = index as u32;
        }

        let index = self.model.mesh.elements.len();
        self.model.mesh.elements.push(corners);
        self.scope.elements.insert(id, index);

        let sets = &mut self.model.mesh.element_sets;
        if let Some(part) = &self.scope.part {
            sets.entry(part.clone()).or_default().push(index);
        }
        if let Some(name) = elset {
            sets.entry(name.to_string()).or_default().push(index);
        }
        Ok(())
    }
}

fn fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn parse_id(field: &str) -> IoResult<u64> {
    field
        .parse()
        .map_err(|_| IoError::invalid_content(format!("bad id '{field}'")))
}

/// Ids listed on one set data line, expanding `start, end[, step]` when
/// `generate` is set.
fn ids_on_line(line: &str, generate: bool) -> IoResult<Vec<u64>> {
    let values = fields(line)
        .into_iter()
        .map(parse_id)
        .collect::<IoResult<Vec<u64>>>()?;
    if !generate {
        return Ok(values);
    }
    match values[..] {
        [start, end] => Ok((start..=end).collect()),
        [start, end, step] if step > 0 => {
            let step = usize::try_from(step)
                .map_err(|_| IoError::invalid_content("GENERATE step too large"))?;
            Ok((start..=end).step_by(step).collect())
        }
        _ => Err(IoError::invalid_content(
            "GENERATE line needs start, end and an optional positive step",
        )),
    }
}
