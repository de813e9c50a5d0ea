use serde::{Deserialize, Serialize};

/// 素材描述（由 CRUD 层写入任务输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDescriptor {
    pub id: String,
    pub storage_locator: String,
    pub original_name: String,
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    /// 页码提示（按页顺序）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_hints: Vec<u32>,
    /// 期望的关卡数量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_count_hint: Option<usize>,
}

/// 素材来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 图片，需要 OCR
    Image,
    /// PDF 或纯文本文档
    Document,
    /// 音频，需要语音识别
    Audio,
    /// 无法识别的类型：能按文本解码就当文本，否则尝试 OCR
    Fallback,
}

impl SourceKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            SourceKind::Image
        } else if mime == "application/pdf" || mime.starts_with("text/") {
            SourceKind::Document
        } else if mime.starts_with("audio/") {
            SourceKind::Audio
        } else {
            SourceKind::Fallback
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Image => "image",
            SourceKind::Document => "document",
            SourceKind::Audio => "audio",
            SourceKind::Fallback => "fallback",
        }
    }
}

/// 单页文本
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub page_number: u32,
    /// 在素材内的物理页序（从 0 开始，空白页也占位）
    pub page_index: usize,
    pub text: String,
    /// 抽取出的候选句（发现顺序）
    pub sentences: Vec<String>,
}

/// 一个素材在任务中的状态
///
/// 任务开始时按上传顺序创建，之后只会挂上文本和句子。
#[derive(Debug, Clone)]
pub struct Material {
    pub descriptor: MaterialDescriptor,
    /// 在任务输入中的位置（从 0 开始）
    pub position: usize,
    pub kind: SourceKind,
    /// 没有页码提示时，本素材第一页之前的页数
    pub page_offset: u32,
    pub pages: Vec<PageText>,
}

impl Material {
    pub fn new(descriptor: MaterialDescriptor, position: usize) -> Self {
        let kind = SourceKind::from_mime(&descriptor.mime_type);
        Self {
            descriptor,
            position,
            kind,
            page_offset: position as u32,
            pages: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// 第 `page_index` 页（从 0 开始）的页码
    ///
    /// 有页码提示时直接使用；提示不足时从最后一个提示往后顺延；
    /// 完全没有提示时，接在前面素材的页之后（见 `assign_page_offsets`）。
    pub fn page_number(&self, page_index: usize) -> u32 {
        let hints = &self.descriptor.page_hints;
        if let Some(hint) = hints.get(page_index) {
            return *hint;
        }
        match hints.last() {
            Some(last) => last + (page_index + 1 - hints.len()) as u32,
            None => self.page_offset + 1 + page_index as u32,
        }
    }

    /// 按页挂上文本，空白页会被忽略
    pub fn attach_pages<I>(&mut self, texts: I)
    where
        I: IntoIterator<Item = String>,
    {
        for (index, text) in texts.into_iter().enumerate() {
            if text.trim().is_empty() {
                continue;
            }
            let page_number = self.page_number(index);
            self.pages.push(PageText {
                page_number,
                page_index: index,
                text,
                sentences: Vec::new(),
            });
        }
    }

    /// 本素材占用的页数，没有文本时也占一页
    pub fn page_span(&self) -> u32 {
        self.pages
            .iter()
            .map(|p| p.page_index as u32 + 1)
            .max()
            .unwrap_or(1)
    }

    /// 设置页码偏移，并重新计算已挂上的页的页码
    pub fn set_page_offset(&mut self, offset: u32) {
        self.page_offset = offset;
        let numbers: Vec<u32> = self
            .pages
            .iter()
            .map(|p| self.page_number(p.page_index))
            .collect();
        for (page, number) in self.pages.iter_mut().zip(numbers) {
            page.page_number = number;
        }
    }

    pub fn raw_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.text.trim().is_empty())
    }

    pub fn sentence_count(&self) -> usize {
        self.pages.iter().map(|p| p.sentences.len()).sum()
    }
}

/// 按上传顺序给素材分配连续的页码区间
///
/// 多页素材之间不会重叠；带页码提示的素材之后从它的最大页码继续。
pub fn assign_page_offsets(materials: &mut [Material]) {
    let mut offset = 0u32;
    for material in materials.iter_mut() {
        material.set_page_offset(offset);
        let last_hinted = material.pages.iter().map(|p| p.page_number).max().unwrap_or(0);
        offset = (offset + material.page_span()).max(last_hinted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(mime: &str, hints: Vec<u32>) -> MaterialDescriptor {
        MaterialDescriptor {
            id: "m1".to_string(),
            storage_locator: "uploads/m1".to_string(),
            original_name: "m1".to_string(),
            mime_type: mime.to_string(),
            size_bytes: 10,
            page_hints: hints,
            lesson_count_hint: None,
        }
    }

    #[test]
    fn test_source_kind_from_mime() {
        assert_eq!(SourceKind::from_mime("image/png"), SourceKind::Image);
        assert_eq!(SourceKind::from_mime("application/pdf"), SourceKind::Document);
        assert_eq!(SourceKind::from_mime("text/plain"), SourceKind::Document);
        assert_eq!(SourceKind::from_mime("audio/mpeg"), SourceKind::Audio);
        assert_eq!(
            SourceKind::from_mime("application/octet-stream"),
            SourceKind::Fallback
        );
    }

    #[test]
    fn test_page_numbers_follow_hints() {
        let material = Material::new(descriptor("application/pdf", vec![12, 13]), 0);
        assert_eq!(material.page_number(0), 12);
        assert_eq!(material.page_number(1), 13);
        assert_eq!(material.page_number(2), 14);

        let image = Material::new(descriptor("image/png", vec![]), 2);
        assert_eq!(image.page_number(0), 3);
    }

    #[test]
    fn test_multi_page_materials_do_not_overlap() {
        let mut first = Material::new(descriptor("text/plain", vec![]), 0);
        first.attach_pages(vec!["Page one.".to_string(), "Page two.".to_string()]);
        let mut second = Material::new(descriptor("text/plain", vec![]), 1);
        second.attach_pages(vec!["Page three.".to_string(), "Page four.".to_string()]);
        // 上传顺序位置决定的旧页码会撞车
        assert_eq!(first.pages[1].page_number, second.pages[0].page_number);

        let mut materials = vec![first, second];
        assign_page_offsets(&mut materials);
        let numbers: Vec<u32> = materials
            .iter()
            .flat_map(|m| m.pages.iter().map(|p| p.page_number))
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_page_offsets_skip_blank_pages_and_follow_hints() {
        let mut scan = Material::new(descriptor("application/pdf", vec![12, 13]), 0);
        scan.attach_pages(vec!["Twelve.".to_string(), "Thirteen.".to_string()]);
        let mut notes = Material::new(descriptor("text/plain", vec![]), 1);
        notes.attach_pages(vec!["".to_string(), "Second page.".to_string()]);
        let empty = Material::new(descriptor("image/png", vec![]), 2);
        let mut photo = Material::new(descriptor("image/png", vec![]), 3);
        photo.attach_pages(vec!["A photo.".to_string()]);

        let mut materials = vec![scan, notes, empty, photo];
        assign_page_offsets(&mut materials);

        assert_eq!(materials[0].pages[1].page_number, 13);
        // 空白页不保留，但仍占一个页码
        assert_eq!(materials[1].pages.len(), 1);
        assert_eq!(materials[1].pages[0].page_number, 15);
        assert_eq!(materials[2].page_offset, 15);
        assert_eq!(materials[3].pages[0].page_number, 17);
    }

    #[test]
    fn test_descriptor_wire_format_is_camel_case() {
        let json = serde_json::json!({
            "id": "m1",
            "storageLocator": "uploads/a.png",
            "originalName": "a.png",
            "mimeType": "image/png",
            "sizeBytes": 1024,
            "pageHints": [4],
        });
        let parsed: MaterialDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.storage_locator, "uploads/a.png");
        assert_eq!(parsed.page_hints, vec![4]);
        assert_eq!(parsed.lesson_count_hint, None);
    }
}
