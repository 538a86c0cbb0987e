use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use gridform_model::{
    Cell, CellRef, ImageFormat, LayoutGroup, Range, Sheet, SheetVisibility, Style, Workbook,
};
use gridform_xlsx::{compose, read_workbook, CategoryLayout, Photo, Record, Warning};
use zip::ZipArchive;

fn template() -> Workbook {
    let mut wb = Workbook::new();

    let mut label = Style::default();
    label.font.bold = true;
    let label_id = wb.styles.intern(label);

    let mut master = Sheet::new("Tpl Item");
    master.visibility = SheetVisibility::Hidden;
    master.set_cell(CellRef::from_a1("B2").unwrap(), Cell::new("Name", label_id));
    master.set_cell(CellRef::from_a1("C2").unwrap(), Cell::new("", label_id));
    master.add_merge(Range::from_a1("B1:D1").unwrap()).unwrap();
    master.print_area = Some(Range::from_a1("A1:E10").unwrap());
    wb.add_sheet(master).unwrap();

    wb.add_sheet(Sheet::new("Cover")).unwrap();
    wb
}

fn layouts() -> Vec<CategoryLayout> {
    vec![CategoryLayout {
        category: "item".to_string(),
        master_sheet: "Tpl Item".to_string(),
        fields: BTreeMap::from([("name".to_string(), CellRef::from_a1("C2").unwrap())]),
        photo_slots: BTreeMap::from([("front".to_string(), Range::from_a1("B4:D8").unwrap())]),
    }]
}

fn record(id: &str, category: &str, name: &str) -> Record {
    Record {
        id: id.to_string(),
        category: category.to_string(),
        values: BTreeMap::from([("name".to_string(), name.to_string())]),
    }
}

#[test]
fn composed_workbook_reads_back_with_clones_and_parked_masters(
) -> Result<(), Box<dyn std::error::Error>> {
    let records = vec![
        record("R-001", "item", "Widget"),
        record("R-002", "item", "Gadget"),
        record("R-404", "ghost", "Lost"),
    ];
    let photos = HashMap::from([(
        ("R-001".to_string(), "front".to_string()),
        Photo {
            bytes: vec![0x89, b'P', b'N', b'G'],
            format: ImageFormat::Png,
        },
    )]);

    let out = compose(&template(), &records, &layouts(), &photos, &[])?;
    assert_eq!(
        out.warnings,
        vec![Warning::MissingTemplate {
            record_id: "R-404".to_string(),
            category: "ghost".to_string(),
        }]
    );

    let reread = read_workbook(&out.bytes)?.workbook;
    // Template sheets survive; one clone per placeable record.
    assert_eq!(reread.sheets.len(), 4);
    assert_eq!(
        reread.sheet_by_name("Tpl Item").unwrap().visibility,
        SheetVisibility::VeryHidden
    );
    assert!(reread.sheet_by_name("Cover").is_some());

    let r1 = reread.sheet_by_name("R-001").unwrap();
    assert_eq!(r1.visibility, SheetVisibility::Visible);
    assert_eq!(r1.cell(CellRef::from_a1("C2")?).unwrap().value, "Widget");
    assert_eq!(r1.merges(), &[Range::from_a1("B1:D1")?]);
    assert_eq!(r1.print_area, Some(Range::from_a1("A1:E10")?));
    let label = reread.styles.get(r1.cell(CellRef::from_a1("B2")?).unwrap().style_id);
    assert!(label.font.bold);

    let r2 = reread.sheet_by_name("R-002").unwrap();
    assert_eq!(r2.cell(CellRef::from_a1("C2")?).unwrap().value, "Gadget");
    Ok(())
}

#[test]
fn photo_lands_in_the_container_as_drawing_and_media(
) -> Result<(), Box<dyn std::error::Error>> {
    let records = vec![record("R-001", "item", "Widget")];
    let photos = HashMap::from([(
        ("R-001".to_string(), "front".to_string()),
        Photo {
            bytes: vec![1, 2, 3, 4],
            format: ImageFormat::Jpeg,
        },
    )]);

    let out = compose(&template(), &records, &layouts(), &photos, &[])?;
    let mut zip = ZipArchive::new(Cursor::new(&out.bytes))?;

    // Clone sheet is third (after the two template sheets).
    assert!(zip.by_name("xl/drawings/drawing3.xml").is_ok());
    {
        let media = zip.by_name("xl/media/image1.jpeg")?;
        assert_eq!(media.size(), 4);
    }
    assert!(zip.by_name("xl/worksheets/_rels/sheet3.xml.rels").is_ok());
    Ok(())
}

#[test]
fn layout_group_aligns_clone_columns_with_the_reference(
) -> Result<(), Box<dyn std::error::Error>> {
    let mut template = template();
    {
        let cover = template.sheet_by_name_mut("Cover").unwrap();
        cover.col_widths.insert(0, 30.0);
        cover.col_widths.insert(2, 14.5);
    }
    let records = vec![
        record("R-001", "item", "Widget"),
        record("R-002", "item", "Gadget"),
    ];

    // Composed order: Tpl Item (0), Cover (1), clones (2, 3).
    let group = LayoutGroup::new(vec![1, 2, 3]);
    let out = compose(&template, &records, &layouts(), &HashMap::new(), &[group])?;

    let reread = read_workbook(&out.bytes)?.workbook;
    let cover_widths = reread.sheet_by_name("Cover").unwrap().col_widths.clone();
    assert_eq!(cover_widths.get(&0), Some(&30.0));
    assert_eq!(
        reread.sheet_by_name("R-001").unwrap().col_widths,
        cover_widths
    );
    assert_eq!(
        reread.sheet_by_name("R-002").unwrap().col_widths,
        cover_widths
    );
    Ok(())
}

#[test]
fn compose_without_records_only_parks_masters() -> Result<(), Box<dyn std::error::Error>> {
    let out = compose(&template(), &[], &layouts(), &HashMap::new(), &[])?;
    assert!(out.warnings.is_empty());

    let reread = read_workbook(&out.bytes)?.workbook;
    assert_eq!(reread.sheets.len(), 2);
    assert_eq!(
        reread.sheet_by_name("Tpl Item").unwrap().visibility,
        SheetVisibility::VeryHidden
    );
    Ok(())
}
