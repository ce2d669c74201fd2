use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use actor_runtime::{AmmunitionDef, ModelRef, SoundRef};
use roxmltree::{Document, Node};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
    UnknownReference,
}

#[derive(Debug, Clone)]
pub struct ContentError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentError {}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponDef {
    pub def_name: String,
    pub model: ModelRef,
    pub damage: u32,
    /// Name of an `AmmunitionDef`; weapons without one are melee weapons.
    pub ammunition: Option<String>,
}

/// Weapon and ammunition definitions loaded from an `<Armory>` XML file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Armory {
    weapons: BTreeMap<String, WeaponDef>,
    ammunition: BTreeMap<String, AmmunitionDef>,
}

impl Armory {
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let raw = fs::read_to_string(path).map_err(|error| ContentError {
            code: ContentErrorCode::ReadFile,
            message: format!("read armory file: {error}"),
            file_path: path.to_path_buf(),
            location: None,
        })?;
        let armory = parse_armory(path, &raw)?;
        info!(
            path = %path.display(),
            weapons = armory.weapons.len(),
            ammunition = armory.ammunition.len(),
            "armory_loaded"
        );
        Ok(armory)
    }

    pub fn weapon(&self, def_name: &str) -> Option<&WeaponDef> {
        self.weapons.get(def_name)
    }

    pub fn ammunition(&self, def_name: &str) -> Option<&AmmunitionDef> {
        self.ammunition.get(def_name)
    }

    pub fn ammunition_for(&self, weapon: &WeaponDef) -> Option<&AmmunitionDef> {
        weapon
            .ammunition
            .as_deref()
            .and_then(|name| self.ammunition(name))
    }

    pub fn weapon_count(&self) -> usize {
        self.weapons.len()
    }
}

/// Built-in armory used when no content file is configured.
pub const DEFAULT_ARMORY_XML: &str = r#"<Armory>
  <AmmunitionDef>
    <defName>bolt_red</defName>
    <model>w_bolt_red</model>
    <shotSound>cb_sh_blaster</shotSound>
    <impactSound>cb_imp_blaster</impactSound>
  </AmmunitionDef>
  <WeaponDef>
    <defName>blaster_pistol</defName>
    <model>w_blstrpstl_001</model>
    <damage>4</damage>
    <ammunition>bolt_red</ammunition>
  </WeaponDef>
  <WeaponDef>
    <defName>vibroblade</defName>
    <model>w_vbroshort_001</model>
    <damage>3</damage>
  </WeaponDef>
</Armory>
"#;

#[derive(Debug)]
struct PendingWeapon {
    def: WeaponDef,
    location: SourceLocation,
}

pub fn parse_armory(file_path: &Path, raw: &str) -> Result<Armory, ContentError> {
    let doc = Document::parse(raw).map_err(|error| ContentError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Armory" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Armory>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let mut armory = Armory::default();
    let mut pending_weapons = Vec::<PendingWeapon>::new();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "WeaponDef" => {
                let def = parse_weapon_def(file_path, &doc, child)?;
                let duplicate = pending_weapons
                    .iter()
                    .any(|pending| pending.def.def_name == def.def_name);
                if duplicate {
                    return Err(duplicate_def(file_path, &doc, child, "WeaponDef", &def.def_name));
                }
                pending_weapons.push(PendingWeapon {
                    def,
                    location: location_of(&doc, child),
                });
            }
            "AmmunitionDef" => {
                let (def_name, def) = parse_ammunition_def(file_path, &doc, child)?;
                if armory.ammunition.contains_key(&def_name) {
                    return Err(duplicate_def(file_path, &doc, child, "AmmunitionDef", &def_name));
                }
                armory.ammunition.insert(def_name, def);
            }
            other => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{other}>; expected <WeaponDef> or <AmmunitionDef>"
                    ),
                    file_path,
                    &doc,
                    child,
                ))
            }
        }
    }

    // Ammunition may be declared after the weapons that use it.
    for pending in pending_weapons {
        if let Some(ammunition) = &pending.def.ammunition {
            if !armory.ammunition.contains_key(ammunition) {
                return Err(ContentError {
                    code: ContentErrorCode::UnknownReference,
                    message: format!(
                        "weapon '{}' references unknown AmmunitionDef '{}'",
                        pending.def.def_name, ammunition
                    ),
                    file_path: file_path.to_path_buf(),
                    location: Some(pending.location),
                });
            }
        }
        armory.weapons.insert(pending.def.def_name.clone(), pending.def);
    }

    Ok(armory)
}

fn parse_weapon_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<WeaponDef, ContentError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut model: Option<String> = None;
    let mut damage: Option<u32> = None;
    let mut ammunition: Option<String> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <WeaponDef>"),
                file_path,
                doc,
                field,
            ));
        }
        match field_name.as_str() {
            "defName" => def_name = Some(required_text(file_path, doc, field, "defName")?),
            "model" => model = Some(required_text(file_path, doc, field, "model")?),
            "ammunition" => {
                ammunition = Some(required_text(file_path, doc, field, "ammunition")?)
            }
            "damage" => {
                let value = required_text(file_path, doc, field, "damage")?;
                let parsed = value.parse::<u32>().map_err(|_| {
                    error_at_node(
                        ContentErrorCode::InvalidValue,
                        format!("damage '{value}' is not a non-negative integer"),
                        file_path,
                        doc,
                        field,
                    )
                })?;
                damage = Some(parsed);
            }
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <WeaponDef>"),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let def_name = require(def_name, "defName", "WeaponDef", file_path, doc, node)?;
    let model = require(model, "model", "WeaponDef", file_path, doc, node)?;
    Ok(WeaponDef {
        def_name,
        model: ModelRef(model),
        damage: damage.unwrap_or(1),
        ammunition,
    })
}

fn parse_ammunition_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<(String, AmmunitionDef), ContentError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut model: Option<String> = None;
    let mut shot_sound: Option<String> = None;
    let mut impact_sound: Option<String> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <AmmunitionDef>"),
                file_path,
                doc,
                field,
            ));
        }
        let slot = match field_name.as_str() {
            "defName" => &mut def_name,
            "model" => &mut model,
            "shotSound" => &mut shot_sound,
            "impactSound" => &mut impact_sound,
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <AmmunitionDef>"),
                    file_path,
                    doc,
                    field,
                ))
            }
        };
        *slot = Some(required_text(file_path, doc, field, &field_name)?);
    }

    let def_name = require(def_name, "defName", "AmmunitionDef", file_path, doc, node)?;
    let model = require(model, "model", "AmmunitionDef", file_path, doc, node)?;
    Ok((
        def_name,
        AmmunitionDef {
            model: ModelRef(model),
            shot_sound: shot_sound.map(SoundRef),
            impact_sound: impact_sound.map(SoundRef),
        },
    ))
}

fn require(
    value: Option<String>,
    field_name: &str,
    def_type: &str,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<String, ContentError> {
    value.ok_or_else(|| {
        error_at_node(
            ContentErrorCode::MissingField,
            format!("missing required field <{field_name}> in <{def_type}>"),
            file_path,
            doc,
            node,
        )
    })
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("field <{field_name}> must not be empty"),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn duplicate_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    def_type: &str,
    def_name: &str,
) -> ContentError {
    error_at_node(
        ContentErrorCode::DuplicateDef,
        format!("duplicate {def_type} '{def_name}'; each defName may appear only once"),
        file_path,
        doc,
        node,
    )
}

fn location_of(doc: &Document<'_>, node: Node<'_, '_>) -> SourceLocation {
    let pos = doc.text_pos_at(node.range().start);
    SourceLocation {
        line: pos.row as usize,
        column: pos.col as usize,
    }
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentError {
    ContentError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(location_of(doc, node)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Armory, ContentError> {
        parse_armory(Path::new("armory.xml"), raw)
    }

    #[test]
    fn default_armory_parses() {
        let armory = parse(DEFAULT_ARMORY_XML).expect("default armory");

        assert_eq!(armory.weapon_count(), 2);
        let pistol = armory.weapon("blaster_pistol").expect("pistol");
        assert_eq!(pistol.damage, 4);
        let bolt = armory.ammunition_for(pistol).expect("bolt");
        assert_eq!(bolt.model, ModelRef("w_bolt_red".to_string()));
        assert_eq!(bolt.impact_sound, Some(SoundRef("cb_imp_blaster".to_string())));
        let blade = armory.weapon("vibroblade").expect("blade");
        assert!(armory.ammunition_for(blade).is_none());
    }

    #[test]
    fn ammunition_may_follow_the_weapon_using_it() {
        let raw = r#"<Armory>
  <WeaponDef><defName>rifle</defName><model>w_rifle</model><ammunition>slug</ammunition></WeaponDef>
  <AmmunitionDef><defName>slug</defName><model>w_slug</model></AmmunitionDef>
</Armory>"#;
        let armory = parse(raw).expect("forward reference");
        let rifle = armory.weapon("rifle").expect("rifle");
        assert_eq!(rifle.damage, 1);
        assert!(armory.ammunition_for(rifle).is_some());
    }

    #[test]
    fn malformed_xml_reports_location() {
        let error = parse("<Armory>\n  <WeaponDef>\n</Armory>").expect_err("malformed");
        assert_eq!(error.code, ContentErrorCode::XmlMalformed);
        assert!(error.location.is_some());
    }

    #[test]
    fn wrong_root_is_rejected() {
        let error = parse("<Defs/>").expect_err("wrong root");
        assert_eq!(error.code, ContentErrorCode::InvalidRoot);
    }

    #[test]
    fn missing_model_points_at_the_def() {
        let raw = "<Armory>\n  <WeaponDef>\n    <defName>stick</defName>\n  </WeaponDef>\n</Armory>";
        let error = parse(raw).expect_err("missing model");

        assert_eq!(error.code, ContentErrorCode::MissingField);
        assert_eq!(error.location, Some(SourceLocation { line: 2, column: 3 }));
        assert!(error.to_string().contains("<model>"));
    }

    #[test]
    fn unknown_and_duplicate_fields_are_rejected() {
        let unknown = parse(
            "<Armory><WeaponDef><defName>a</defName><model>m</model><color>red</color></WeaponDef></Armory>",
        )
        .expect_err("unknown field");
        assert_eq!(unknown.code, ContentErrorCode::UnknownField);

        let duplicate = parse(
            "<Armory><AmmunitionDef><defName>a</defName><model>m</model><model>n</model></AmmunitionDef></Armory>",
        )
        .expect_err("duplicate field");
        assert_eq!(duplicate.code, ContentErrorCode::DuplicateField);
    }

    #[test]
    fn invalid_damage_is_rejected() {
        let error = parse(
            "<Armory><WeaponDef><defName>a</defName><model>m</model><damage>-2</damage></WeaponDef></Armory>",
        )
        .expect_err("negative damage");
        assert_eq!(error.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn dangling_ammunition_reference_is_rejected() {
        let error = parse(
            "<Armory><WeaponDef><defName>a</defName><model>m</model><ammunition>none</ammunition></WeaponDef></Armory>",
        )
        .expect_err("dangling reference");
        assert_eq!(error.code, ContentErrorCode::UnknownReference);
    }

    #[test]
    fn duplicate_def_names_are_rejected() {
        let error = parse(
            "<Armory><AmmunitionDef><defName>a</defName><model>m</model></AmmunitionDef><AmmunitionDef><defName>a</defName><model>n</model></AmmunitionDef></Armory>",
        )
        .expect_err("duplicate def");
        assert_eq!(error.code, ContentErrorCode::DuplicateDef);
    }

    #[test]
    fn load_reads_from_disk_and_reports_missing_files() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("armory.xml");
        fs::write(&path, DEFAULT_ARMORY_XML).expect("write armory");

        assert_eq!(Armory::load(&path).expect("load").weapon_count(), 2);
        let missing = Armory::load(&dir.path().join("absent.xml")).expect_err("missing file");
        assert_eq!(missing.code, ContentErrorCode::ReadFile);
    }
}
