pub mod pdf_fixtures {
    use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

    fn media_box(width: f64, height: f64) -> Object {
        vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width as f32),
            Object::Real(height as f32),
        ]
        .into()
    }

    fn resources(document: &mut Document) -> ObjectId {
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        document.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        })
    }

    /// Content stream with one line of text near the top and a rule across the middle
    fn content(document: &mut Document, label: &str, width: f64, height: f64) -> ObjectId {
        let operations = format!(
            "BT /F1 24 Tf 36 {top} Td ({label}) Tj ET\n0 {mid} m {width} {mid} l S\n",
            top = height - 60.0,
            mid = height / 2.0,
        );
        document.add_object(Stream::new(Dictionary::new(), operations.into_bytes()))
    }

    fn finish(mut document: Document, pages_id: ObjectId) -> Vec<u8> {
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        document
            .save_to(&mut buffer)
            .expect("in-memory save succeeds");
        buffer
    }

    /// One page with its own MediaBox and Resources
    pub fn single_page_pdf(width: f64, height: f64) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let resources_id = resources(&mut document);
        let content_id = content(&mut document, "Band fixture", width, height);

        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box(width, height),
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        finish(document, pages_id)
    }

    /// Two pages that inherit MediaBox and Resources from the page tree node
    pub fn two_page_pdf(width: f64, height: f64) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let resources_id = resources(&mut document);

        let kids: Vec<Object> = ["First page", "Second page"]
            .into_iter()
            .map(|label| {
                let content_id = content(&mut document, label, width, height);
                document
                    .add_object(dictionary! {
                        "Type" => "Page",
                        "Parent" => pages_id,
                        "Contents" => content_id,
                    })
                    .into()
            })
            .collect();

        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(2),
                "MediaBox" => media_box(width, height),
                "Resources" => resources_id,
            }),
        );
        finish(document, pages_id)
    }
}
