//! Fixed parts of a generated package: content types, relationships,
//! master, layout, theme and document properties.

use crate::xml::escape_text;
use std::fmt::Write as FmtWrite;

pub const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_EXTENDED_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
const REL_PRES_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/presProps";
const REL_VIEW_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/viewProps";
const REL_TABLE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/tableStyles";

pub const SLIDE_MASTER_ID: u32 = 2_147_483_648;
pub const SLIDE_LAYOUT_ID: u32 = 2_147_483_649;
pub const FIRST_SLIDE_ID: u32 = 256;

/// Relationship id of the first slide in `presentation.xml.rels`.
/// rId1 to rId5 are the master, theme and property parts.
const FIRST_SLIDE_REL: usize = 6;

pub const MASTER_PART: &str = "ppt/slideMasters/slideMaster1.xml";
pub const MASTER_RELS_PART: &str = "ppt/slideMasters/_rels/slideMaster1.xml.rels";
pub const LAYOUT_PART: &str = "ppt/slideLayouts/slideLayout1.xml";
pub const LAYOUT_RELS_PART: &str = "ppt/slideLayouts/_rels/slideLayout1.xml.rels";
pub const THEME_PART: &str = "ppt/theme/theme1.xml";
pub const PRES_PROPS_PART: &str = "ppt/presProps.xml";
pub const VIEW_PROPS_PART: &str = "ppt/viewProps.xml";
pub const TABLE_STYLES_PART: &str = "ppt/tableStyles.xml";
pub const CORE_PROPS_PART: &str = "docProps/core.xml";
pub const APP_PROPS_PART: &str = "docProps/app.xml";
pub const ROOT_RELS_PART: &str = "_rels/.rels";

pub fn slide_part(number: usize) -> String {
    format!("ppt/slides/slide{}.xml", number)
}

pub fn slide_rels_part(number: usize) -> String {
    format!("ppt/slides/_rels/slide{}.xml.rels", number)
}

fn relationship(out: &mut String, id: &str, rel_type: &str, target: &str) {
    let _ = write!(
        out,
        r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
        id, rel_type, target
    );
}

fn relationships(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = String::with_capacity(512);
    xml.push_str(XML_HEADER);
    let _ = write!(xml, r#"<Relationships xmlns="{}">"#, NS_RELS);
    for (id, rel_type, target) in entries {
        relationship(&mut xml, id, rel_type, target);
    }
    xml.push_str("</Relationships>");
    xml
}

/// `[Content_Types].xml` for a package with `slide_count` slides.
pub fn content_types(slide_count: usize) -> String {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_HEADER);
    let _ = write!(xml, r#"<Types xmlns="{}">"#, NS_CONTENT_TYPES);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

    let overrides = [
        ("/ppt/presentation.xml", "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"),
        ("/ppt/slideMasters/slideMaster1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"),
        ("/ppt/slideLayouts/slideLayout1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"),
        ("/ppt/theme/theme1.xml", "application/vnd.openxmlformats-officedocument.theme+xml"),
        ("/ppt/presProps.xml", "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml"),
        ("/ppt/viewProps.xml", "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml"),
        ("/ppt/tableStyles.xml", "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml"),
        ("/docProps/core.xml", "application/vnd.openxmlformats-package.core-properties+xml"),
        ("/docProps/app.xml", "application/vnd.openxmlformats-officedocument.extended-properties+xml"),
    ];
    for (part, content_type) in overrides {
        let _ = write!(
            xml,
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            part, content_type
        );
    }

    for number in 1..=slide_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
            number
        );
    }

    xml.push_str("</Types>");
    xml
}

/// `_rels/.rels`.
pub fn root_relationships() -> String {
    relationships(&[
        ("rId1", REL_OFFICE_DOCUMENT, "ppt/presentation.xml"),
        ("rId2", REL_CORE_PROPERTIES, "docProps/core.xml"),
        ("rId3", REL_EXTENDED_PROPERTIES, "docProps/app.xml"),
    ])
}

/// `ppt/presentation.xml` listing `slide_ids` in order.
pub fn presentation(slide_ids: &[u32], slide_width: i64, slide_height: i64) -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_HEADER);
    let _ = write!(
        xml,
        r#"<p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" saveSubsetFonts="1">"#,
        NS_A, NS_R, NS_P
    );
    let _ = write!(
        xml,
        r#"<p:sldMasterIdLst><p:sldMasterId id="{}" r:id="rId1"/></p:sldMasterIdLst>"#,
        SLIDE_MASTER_ID
    );

    xml.push_str("<p:sldIdLst>");
    for (index, id) in slide_ids.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            id,
            FIRST_SLIDE_REL + index
        );
    }
    xml.push_str("</p:sldIdLst>");

    let _ = write!(
        xml,
        r#"<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/>"#,
        slide_width, slide_height
    );
    xml.push_str("</p:presentation>");
    xml
}

/// `ppt/_rels/presentation.xml.rels` for `slide_count` slides.
pub fn presentation_relationships(slide_count: usize) -> String {
    let slide_entries: Vec<(String, String)> = (0..slide_count)
        .map(|index| {
            (
                format!("rId{}", FIRST_SLIDE_REL + index),
                format!("slides/slide{}.xml", index + 1),
            )
        })
        .collect();

    let mut entries = vec![
        ("rId1", REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml"),
        ("rId2", REL_THEME, "theme/theme1.xml"),
        ("rId3", REL_PRES_PROPS, "presProps.xml"),
        ("rId4", REL_VIEW_PROPS, "viewProps.xml"),
        ("rId5", REL_TABLE_STYLES, "tableStyles.xml"),
    ];
    entries.extend(
        slide_entries
            .iter()
            .map(|(id, target)| (id.as_str(), REL_SLIDE, target.as_str())),
    );

    relationships(&entries)
}

/// Shape tree opening with its group root (`p:nvGrpSpPr` + `p:grpSpPr`).
pub fn shape_tree_start(group_id: u32) -> String {
    format!(
        concat!(
            r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="{}" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#,
            r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
        ),
        group_id
    )
}

/// `ppt/slideMasters/slideMaster1.xml`.
pub fn slide_master(group_id: u32) -> String {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_HEADER);
    let _ = write!(
        xml,
        r#"<p:sldMaster xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#,
        NS_A, NS_R, NS_P
    );
    xml.push_str(r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>"#);
    xml.push_str(&shape_tree_start(group_id));
    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str(concat!(
        r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" "#,
        r#"accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" "#,
        r#"hlink="hlink" folHlink="folHlink"/>"#
    ));
    let _ = write!(
        xml,
        r#"<p:sldLayoutIdLst><p:sldLayoutId id="{}" r:id="rId1"/></p:sldLayoutIdLst>"#,
        SLIDE_LAYOUT_ID
    );
    xml.push_str(concat!(
        "<p:txStyles>",
        r#"<p:titleStyle><a:lvl1pPr algn="l"><a:defRPr sz="4400"/></a:lvl1pPr></p:titleStyle>"#,
        r#"<p:bodyStyle><a:lvl1pPr algn="l"><a:defRPr sz="2800"/></a:lvl1pPr></p:bodyStyle>"#,
        r#"<p:otherStyle><a:lvl1pPr algn="l"><a:defRPr sz="1800"/></a:lvl1pPr></p:otherStyle>"#,
        "</p:txStyles>"
    ));
    xml.push_str("</p:sldMaster>");
    xml
}

pub fn slide_master_relationships() -> String {
    relationships(&[
        ("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
        ("rId2", REL_THEME, "../theme/theme1.xml"),
    ])
}

/// `ppt/slideLayouts/slideLayout1.xml`, a blank layout.
pub fn slide_layout(group_id: u32) -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_HEADER);
    let _ = write!(
        xml,
        r#"<p:sldLayout xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" type="blank" preserve="1">"#,
        NS_A, NS_R, NS_P
    );
    xml.push_str(r#"<p:cSld name="Blank">"#);
    xml.push_str(&shape_tree_start(group_id));
    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>");
    xml
}

pub fn slide_layout_relationships() -> String {
    relationships(&[("rId1", REL_SLIDE_MASTER, "../slideMasters/slideMaster1.xml")])
}

pub fn slide_relationships() -> String {
    relationships(&[("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml")])
}

/// Wrap already rendered shapes into a slide part.
pub fn slide(group_id: u32, shapes: &str) -> String {
    let mut xml = String::with_capacity(1024 + shapes.len());
    xml.push_str(XML_HEADER);
    let _ = write!(
        xml,
        r#"<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#,
        NS_A, NS_R, NS_P
    );
    xml.push_str("<p:cSld>");
    xml.push_str(&shape_tree_start(group_id));
    xml.push_str(shapes);
    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>");
    xml
}

/// `ppt/theme/theme1.xml`.
pub fn theme() -> String {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_HEADER);
    let _ = write!(xml, r#"<a:theme xmlns:a="{}" name="Office Theme">"#, NS_A);
    xml.push_str("<a:themeElements>");

    xml.push_str(r#"<a:clrScheme name="Office">"#);
    xml.push_str(r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>"#);
    xml.push_str(r#"<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#);
    for (slot, color) in [
        ("dk2", "44546A"),
        ("lt2", "E7E6E6"),
        ("accent1", "4472C4"),
        ("accent2", "ED7D31"),
        ("accent3", "A5A5A5"),
        ("accent4", "FFC000"),
        ("accent5", "5B9BD5"),
        ("accent6", "70AD47"),
        ("hlink", "0563C1"),
        ("folHlink", "954F72"),
    ] {
        let _ = write!(xml, r#"<a:{0}><a:srgbClr val="{1}"/></a:{0}>"#, slot, color);
    }
    xml.push_str("</a:clrScheme>");

    xml.push_str(concat!(
        r#"<a:fontScheme name="Office">"#,
        r#"<a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
        r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
        "</a:fontScheme>"
    ));

    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    xml.push_str(r#"<a:fmtScheme name="Office"><a:fillStyleLst>"#);
    xml.push_str(&solid.repeat(3));
    xml.push_str("</a:fillStyleLst><a:lnStyleLst>");
    for width in [6350, 12700, 19050] {
        let _ = write!(xml, r#"<a:ln w="{}">{}</a:ln>"#, width, solid);
    }
    xml.push_str("</a:lnStyleLst><a:effectStyleLst>");
    xml.push_str(&"<a:effectStyle><a:effectLst/></a:effectStyle>".repeat(3));
    xml.push_str("</a:effectStyleLst><a:bgFillStyleLst>");
    xml.push_str(&solid.repeat(3));
    xml.push_str("</a:bgFillStyleLst></a:fmtScheme>");

    xml.push_str("</a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>");
    xml
}

pub fn presentation_properties() -> String {
    format!(
        r#"{}<p:presentationPr xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"/>"#,
        XML_HEADER, NS_A, NS_R, NS_P
    )
}

pub fn view_properties() -> String {
    format!(
        concat!(
            r#"{}<p:viewPr xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#,
            r#"<p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr>"#,
            r#"<p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
        ),
        XML_HEADER, NS_A, NS_R, NS_P
    )
}

pub fn table_styles() -> String {
    format!(
        r#"{}<a:tblStyleLst xmlns:a="{}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#,
        XML_HEADER, NS_A
    )
}

/// `docProps/core.xml`.
pub fn core_properties(title: &str, author: &str) -> String {
    format!(
        concat!(
            "{}",
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            "<dc:title>{}</dc:title><dc:creator>{}</dc:creator><cp:lastModifiedBy>{}</cp:lastModifiedBy>",
            "</cp:coreProperties>"
        ),
        XML_HEADER,
        escape_text(title),
        escape_text(author),
        escape_text(author)
    )
}

/// `docProps/app.xml`.
pub fn app_properties(slide_count: usize) -> String {
    format!(
        concat!(
            "{}",
            r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" "#,
            r#"xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#,
            "<Application>mathslides</Application><PresentationFormat>Custom</PresentationFormat>",
            "<Slides>{}</Slides></Properties>"
        ),
        XML_HEADER, slide_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    #[test]
    fn test_fixed_parts_are_well_formed() {
        for xml in [
            content_types(3),
            root_relationships(),
            presentation(&[256, 257], 9_144_000, 6_858_000),
            presentation_relationships(2),
            slide_master(1),
            slide_master_relationships(),
            slide_layout(2),
            slide_layout_relationships(),
            slide_relationships(),
            slide(3, ""),
            theme(),
            presentation_properties(),
            view_properties(),
            table_styles(),
            core_properties("A & B", "me"),
            app_properties(2),
        ] {
            assert!(parse_document(&xml).is_ok(), "not well-formed: {}", xml);
        }
    }

    #[test]
    fn test_presentation_relationship_ids_line_up() {
        let pres = presentation(&[256, 257], 9_144_000, 6_858_000);
        assert!(pres.contains(r#"<p:sldId id="256" r:id="rId6"/><p:sldId id="257" r:id="rId7"/>"#));

        let rels = presentation_relationships(2);
        assert!(rels.contains(r#"Id="rId6" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml""#));
        assert!(rels.contains(r#"Id="rId7""#));
        assert!(!rels.contains(r#"Id="rId8""#));
    }

    #[test]
    fn test_content_types_list_every_slide() {
        let types = content_types(2);
        assert!(types.contains("/ppt/slides/slide1.xml"));
        assert!(types.contains("/ppt/slides/slide2.xml"));
        assert!(!types.contains("/ppt/slides/slide3.xml"));
    }

    #[test]
    fn test_table_styles_keeps_braces() {
        assert!(table_styles().contains(r#"def="{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}""#));
    }
}
