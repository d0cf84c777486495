use crate::utils::ScanError;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use log::{debug, info, warn};

/// How far up the page tree inherited resources are looked for.
const MAX_TREE_DEPTH: usize = 32;

/// Turns the first page of a PDF into a raster image.
///
/// `Ok(None)` means the document parsed but produced no page image.
pub trait PageRenderer {
    fn render_first_page(&self, pdf: &[u8]) -> Result<Option<DynamicImage>, ScanError>;
}

impl<R: PageRenderer + ?Sized> PageRenderer for &R {
    fn render_first_page(&self, pdf: &[u8]) -> Result<Option<DynamicImage>, ScanError> {
        (**self).render_first_page(pdf)
    }
}

/// Renders a page by pulling out its largest embedded image.
///
/// Scanned documents are almost always a single full-page image XObject, so
/// no vector rasterisation is attempted. Supported encodings are DCT (JPEG)
/// and raw or Flate-compressed 8-bit DeviceRGB / DeviceGray samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedImageRenderer;

impl PageRenderer for EmbeddedImageRenderer {
    fn render_first_page(&self, pdf: &[u8]) -> Result<Option<DynamicImage>, ScanError> {
        let document = Document::load_mem(pdf)
            .map_err(|e| ScanError::PdfConversionError(format!("failed to load PDF: {}", e)))?;

        let pages = document.get_pages();
        let Some((&number, &page_id)) = pages.iter().next() else {
            warn!("PDF has no pages");
            return Ok(None);
        };
        debug!("PDF has {} page(s), rendering page {}", pages.len(), number);

        let mut largest: Option<DynamicImage> = None;
        for stream in page_images(&document, page_id)? {
            match decode_image(stream) {
                Ok(image) => {
                    let area = |i: &DynamicImage| i.width() as u64 * i.height() as u64;
                    if largest.as_ref().map_or(true, |l| area(&image) > area(l)) {
                        largest = Some(image);
                    }
                }
                Err(e) => warn!("Skipping embedded image: {}", e),
            }
        }

        match &largest {
            Some(image) => info!("Rendered PDF page {} as {}x{} image", number, image.width(), image.height()),
            None => warn!("PDF page {} has no decodable image", number),
        }
        Ok(largest)
    }
}

/// True when the upload looks like a PDF, by magic bytes or by extension.
pub fn is_pdf(bytes: &[u8], file_name: &str) -> bool {
    bytes.starts_with(b"%PDF-") || file_name.to_ascii_lowercase().ends_with(".pdf")
}

fn pdf_error(e: lopdf::Error) -> ScanError {
    ScanError::PdfConversionError(e.to_string())
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object, ScanError> {
    match object {
        Object::Reference(id) => document.get_object(*id).map_err(pdf_error),
        other => Ok(other),
    }
}

/// Resources of a page, inherited from an ancestor in the page tree if the
/// page itself has none.
fn page_resources(document: &Document, page_id: ObjectId) -> Result<Option<&Dictionary>, ScanError> {
    let mut current = Some(page_id);
    for _ in 0..MAX_TREE_DEPTH {
        let Some(id) = current else { break };
        let node = document.get_dictionary(id).map_err(pdf_error)?;
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(document, resources)?.as_dict().map(Some).map_err(pdf_error);
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(None)
}

fn page_images(document: &Document, page_id: ObjectId) -> Result<Vec<&Stream>, ScanError> {
    let Some(resources) = page_resources(document, page_id)? else {
        return Ok(Vec::new());
    };
    let Ok(xobjects) = resources.get(b"XObject") else {
        return Ok(Vec::new());
    };
    let xobjects = resolve(document, xobjects)?.as_dict().map_err(pdf_error)?;

    let mut images = Vec::new();
    for (name, object) in xobjects.iter() {
        let Ok(stream) = resolve(document, object)?.as_stream() else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map_or(false, |subtype| subtype == b"Image");
        if is_image {
            debug!("Found image XObject /{}", String::from_utf8_lossy(name));
            images.push(stream);
        }
    }
    Ok(images)
}

fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, ScanError> {
    let value = dict.get(key).and_then(Object::as_i64).map_err(pdf_error)?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ScanError::PdfConversionError(format!("bad image {}: {}", String::from_utf8_lossy(key), value)))
}

fn decode_image(stream: &Stream) -> Result<DynamicImage, ScanError> {
    let filters = filters(&stream.dict);
    let samples = match filters.as_slice() {
        [only] if only.as_slice() == b"DCTDecode" => {
            return image::load_from_memory(&stream.content)
                .map_err(|e| ScanError::PdfConversionError(format!("bad JPEG image: {}", e)));
        }
        [] => stream.content.clone(),
        [only] if only.as_slice() == b"FlateDecode" => stream.decompressed_content().map_err(pdf_error)?,
        other => {
            let names: Vec<String> = other.iter().map(|n| String::from_utf8_lossy(n).into_owned()).collect();
            return Err(ScanError::PdfConversionError(format!("unsupported image filter {:?}", names)));
        }
    };

    let width = dimension(&stream.dict, b"Width")?;
    let height = dimension(&stream.dict, b"Height")?;
    let bits = stream.dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    if bits != 8 {
        return Err(ScanError::PdfConversionError(format!("unsupported bit depth {}", bits)));
    }
    let color_space = stream.dict.get(b"ColorSpace").and_then(Object::as_name).unwrap_or(b"DeviceRGB");

    let too_large = || ScanError::PdfConversionError(format!("image too large: {}x{}", width, height));
    let pixels = (width as usize).checked_mul(height as usize).ok_or_else(too_large)?;
    let short = |needed: usize| {
        ScanError::PdfConversionError(format!("image data too short: {} of {} bytes", samples.len(), needed))
    };
    match color_space {
        b"DeviceRGB" => {
            let needed = pixels.checked_mul(3).ok_or_else(too_large)?;
            let data = samples.get(..needed).ok_or_else(|| short(needed))?.to_vec();
            RgbImage::from_raw(width, height, data)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| short(needed))
        }
        b"DeviceGray" => {
            let data = samples.get(..pixels).ok_or_else(|| short(pixels))?.to_vec();
            GrayImage::from_raw(width, height, data)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| short(pixels))
        }
        other => Err(ScanError::PdfConversionError(format!(
            "unsupported colour space {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;

    /// One-page PDF whose resources hold the given raw 8-bit images, keyed
    /// by (width, height, colour space, samples). Resources sit on the page
    /// tree root so inheritance is exercised.
    pub(crate) fn pdf_with_images(images: &[(i64, i64, &str, Vec<u8>)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut xobjects = Dictionary::new();
        for (index, (width, height, color_space, samples)) in images.iter().enumerate() {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => *width,
                    "Height" => *height,
                    "ColorSpace" => *color_space,
                    "BitsPerComponent" => 8,
                },
                samples.clone(),
            ));
            xobjects.set(format!("Im{}", index), image_id);
        }
        let resources_id = doc.add_object(dictionary! { "XObject" => xobjects });

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_renders_largest_embedded_image() {
        let small = (2, 2, "DeviceGray", vec![0u8; 4]);
        let large = (4, 3, "DeviceRGB", vec![200u8; 36]);
        let pdf = pdf_with_images(&[small, large]);

        let image = EmbeddedImageRenderer.render_first_page(&pdf).unwrap().unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
        assert_eq!(image.to_rgb8().get_pixel(1, 1).0, [200, 200, 200]);
    }

    #[test]
    fn test_gray_image_is_supported() {
        let pdf = pdf_with_images(&[(3, 2, "DeviceGray", vec![10, 20, 30, 40, 50, 60])]);
        let image = EmbeddedImageRenderer.render_first_page(&pdf).unwrap().unwrap();
        assert_eq!(image.to_luma8().get_pixel(2, 1).0, [60]);
    }

    #[test]
    fn test_page_without_images_renders_nothing() {
        let pdf = pdf_with_images(&[]);
        assert!(EmbeddedImageRenderer.render_first_page(&pdf).unwrap().is_none());
    }

    #[test]
    fn test_truncated_samples_are_skipped() {
        let pdf = pdf_with_images(&[(10, 10, "DeviceRGB", vec![1u8; 12])]);
        assert!(EmbeddedImageRenderer.render_first_page(&pdf).unwrap().is_none());
    }

    #[test]
    fn test_huge_dimensions_are_rejected_not_panicking() {
        let max = u32::MAX as i64;
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => max,
                "Height" => max,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![0u8; 12],
        );
        assert!(matches!(decode_image(&stream), Err(ScanError::PdfConversionError(_))));

        let pdf = pdf_with_images(&[(max, max, "DeviceRGB", vec![0u8; 12])]);
        assert!(EmbeddedImageRenderer.render_first_page(&pdf).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_an_error() {
        let result = EmbeddedImageRenderer.render_first_page(b"%PDF-1.4 definitely not a pdf");
        assert!(matches!(result, Err(ScanError::PdfConversionError(_))));
    }

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(b"%PDF-1.7\n", "upload"));
        assert!(is_pdf(b"", "SCAN.PDF"));
        assert!(!is_pdf(b"\x89PNG", "scan.png"));
    }
}
