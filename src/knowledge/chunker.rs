//! Text Chunking Module
//!
//! 법령 텍스트 인식 분할을 제공합니다.
//! 조문(제N조) 경계를 존중하면서 적절한 크기의 청크로 나눕니다.

use regex::Regex;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최소 청크 크기 (문자 수)
    pub min_characters: usize,
    /// 최대 청크 크기 (문자 수)
    pub max_characters: usize,
    /// 오버랩 크기 (문자 수)
    pub overlap_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_characters: 200,
            max_characters: 1500,
            overlap_characters: 150,
        }
    }
}

impl ChunkConfig {
    /// 오버랩 없는 빠른 인덱싱용 설정
    pub fn without_overlap() -> Self {
        Self {
            overlap_characters: 0,
            ..Self::default()
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// StatuteChunker
// ============================================================================

/// 법령 조문 인식 청커
///
/// 법령 텍스트 구조를 존중하면서 분할합니다:
/// - 조문(제N조, 제N조의M) 경계 유지
/// - 문단 경계 존중
/// - 너무 작은 청크는 병합
pub struct StatuteChunker {
    config: ChunkConfig,
    article_re: Regex,
}

impl StatuteChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        // 조문 헤더: "제55조", "제 55 조", "제55조의2" 등 (줄 시작)
        let article_re = Regex::new(r"(?m)^\s*제\s*\d+\s*조(?:\s*의\s*\d+)?\s*[(\[]?")
            .expect("Invalid article regex");

        Self { config, article_re }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 법령 텍스트를 조문 단위 섹션으로 분할
    fn split_sections(&self, text: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current = String::new();

        for line in text.lines() {
            // 조문 헤더를 만나면 새 섹션 시작
            if self.article_re.is_match(line) && !current.trim().is_empty() {
                sections.push(current.trim().to_string());
                current = String::new();
            }

            current.push_str(line);
            current.push('\n');
        }

        // 마지막 섹션 추가
        if !current.trim().is_empty() {
            sections.push(current.trim().to_string());
        }

        sections
    }

    /// 긴 섹션을 문단 경계에서 분할
    fn split_long_section(&self, section: &str) -> Vec<String> {
        if section.len() <= self.config.max_characters {
            return vec![section.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        // 이중 줄바꿈(문단 경계)으로 분할
        for para in section.split("\n\n") {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }

            // 현재 청크에 추가하면 최대 크기 초과?
            if !current.is_empty() && current.len() + para.len() + 2 > self.config.max_characters {
                if current.len() >= self.config.min_characters {
                    chunks.push(current.clone());
                    current = String::new();
                }
            }

            // 문단 자체가 최대 크기 초과?
            if para.len() > self.config.max_characters {
                // 작은 조각도 버리지 않고 내보냄 (병합 단계에서 합쳐짐)
                if !current.is_empty() {
                    chunks.push(current.clone());
                    current = String::new();
                }

                // 긴 문단을 줄 단위로 분할
                let mut line_chunk = String::new();
                for line in para.lines() {
                    if !line_chunk.is_empty()
                        && line_chunk.len() + line.len() + 1 > self.config.max_characters
                    {
                        chunks.push(line_chunk.clone());
                        line_chunk = String::new();
                    }
                    if !line_chunk.is_empty() {
                        line_chunk.push('\n');
                    }
                    line_chunk.push_str(line);
                }
                if !line_chunk.is_empty() {
                    current = line_chunk;
                }
            } else {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(para);
            }
        }

        // 마지막 청크 추가
        if !current.is_empty() {
            chunks.push(current);
        }

        // 너무 작은 청크 병합
        self.merge_small_chunks(chunks)
    }

    /// 작은 청크 병합
    fn merge_small_chunks(&self, chunks: Vec<String>) -> Vec<String> {
        if self.config.min_characters == 0 {
            return chunks;
        }

        let mut result: Vec<String> = Vec::new();

        for chunk in chunks {
            if let Some(last) = result.last_mut() {
                // 이전 청크가 너무 작으면 병합
                if last.len() < self.config.min_characters
                    && last.len() + chunk.len() + 2 <= self.config.max_characters
                {
                    last.push_str("\n\n");
                    last.push_str(&chunk);
                    continue;
                }
            }
            result.push(chunk);
        }

        result
    }

    /// 오버랩 적용
    fn apply_overlap(&self, chunks: Vec<String>) -> Vec<String> {
        if self.config.overlap_characters == 0 || chunks.len() < 2 {
            return chunks;
        }

        let mut result = Vec::with_capacity(chunks.len());

        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                result.push(chunk.clone());
            } else {
                // 이전 청크의 끝부분 가져오기
                let prev = &chunks[i - 1];
                let overlap_start = prev.len().saturating_sub(self.config.overlap_characters);

                // UTF-8 경계 조정
                let overlap_start = floor_char_boundary(prev, overlap_start);

                // 단어 경계에서 시작 (전각 공백 등 멀티바이트 공백은 문자 폭만큼 전진)
                let overlap_text = &prev[overlap_start..];
                let word_start = overlap_text
                    .char_indices()
                    .find(|&(_, c)| c.is_whitespace())
                    .map(|(p, c)| overlap_start + p + c.len_utf8())
                    .unwrap_or(overlap_start);

                let overlap = &prev[word_start..];

                // 오버랩이 의미있으면 추가
                if !overlap.trim().is_empty() && overlap.len() > 20 {
                    result.push(format!("...\n{}\n---\n{}", overlap.trim(), chunk));
                } else {
                    result.push(chunk.clone());
                }
            }
        }

        result
    }
}

impl Chunker for StatuteChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        // 1. 조문 단위 섹션으로 분할
        let sections = self.split_sections(text);

        // 2. 긴 섹션 분할
        let mut chunks: Vec<String> = sections
            .into_iter()
            .flat_map(|s| self.split_long_section(&s))
            .collect();

        // 3. 빈 청크 제거
        chunks.retain(|c| !c.trim().is_empty());

        // 4. 오버랩 적용
        self.apply_overlap(chunks)
    }

    fn name(&self) -> &'static str {
        "StatuteChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// UTF-8 경계 조정 (인덱스 이하로)
#[inline]
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(StatuteChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_empty() {
        let chunker = StatuteChunker::with_defaults();
        let chunks = chunker.chunk("");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunker_small_text() {
        let chunker = StatuteChunker::with_defaults();
        let text = "제1조(목적)\n\n이 법은 소득세의 과세 요건을 정한다.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("제1조"));
    }

    #[test]
    fn test_chunker_splits_on_articles() {
        let config = ChunkConfig {
            min_characters: 10,
            max_characters: 200,
            overlap_characters: 0,
        };
        let chunker = StatuteChunker::new(config);

        let text = "제14조(과세표준의 계산)\n\
                    거주자의 종합소득에 대한 과세표준은 종합소득금액에서 계산한다.\n\
                    제15조(세율)\n\
                    소득세율은 과세표준에 따라 정한다.";

        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 2);
        // 조문 헤더가 본문과 같은 청크에 붙어 있어야 함
        assert!(chunks[0].starts_with("제14조"));
        assert!(chunks[0].contains("과세표준은"));
        assert!(chunks[1].starts_with("제15조"));
        assert!(chunks[1].contains("소득세율은"));
    }

    #[test]
    fn test_chunker_article_with_subnumber() {
        let config = ChunkConfig {
            min_characters: 5,
            max_characters: 200,
            overlap_characters: 0,
        };
        let chunker = StatuteChunker::new(config);

        let text = "제1조의2(정의)\n거주자란 국내에 주소를 둔 개인을 말한다.\n\
                    제2조(납세의무)\n거주자는 소득세를 납부할 의무를 진다.";

        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("제1조의2"));
    }

    #[test]
    fn test_chunker_long_section_split() {
        let config = ChunkConfig {
            min_characters: 50,
            max_characters: 200,
            overlap_characters: 0,
        };
        let chunker = StatuteChunker::new(config);

        let para = "거주자의 소득에 관한 내용이다.\n".repeat(10);
        let text = format!("제10조(예시)\n\n{}\n\n{}", para, para);

        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 250));
    }

    #[test]
    fn test_merge_small_chunks() {
        let config = ChunkConfig {
            min_characters: 100,
            max_characters: 500,
            overlap_characters: 0,
        };
        let chunker = StatuteChunker::new(config);

        let chunks = vec![
            "짧은 청크 1.".to_string(),
            "짧은 청크 2.".to_string(),
            "짧은 청크 3.".to_string(),
        ];

        let merged = chunker.merge_small_chunks(chunks);
        assert!(merged.len() < 3);
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "소득세법 제1조";

        // 한글 문자 중간 인덱스는 경계로 내림
        let adjusted = floor_char_boundary(s, 4);
        assert!(s.is_char_boundary(adjusted));

        // 문자열 끝 초과
        assert_eq!(floor_char_boundary(s, 100), s.len());

        // 빈 문자열
        assert_eq!(floor_char_boundary("", 0), 0);
    }

    #[test]
    fn test_overlap_applied() {
        let config = ChunkConfig {
            min_characters: 30,
            max_characters: 200,
            overlap_characters: 80,
        };
        let chunker = StatuteChunker::new(config);

        let text = "제1조(목적)\n이 법은 개인의 소득에 대하여 소득의 성격과 납세자의 부담능력에 따라 과세한다.\n\
                    제2조(정의)\n이 법에서 사용하는 용어의 뜻은 다음과 같이 정하며 각 호의 구분에 따른다.";

        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 2);
        // 두 번째 청크에 이전 청크 꼬리가 붙음
        assert!(chunks[1].starts_with("..."));
    }

    #[test]
    fn test_overlap_with_ideographic_space() {
        let config = ChunkConfig {
            min_characters: 10,
            max_characters: 200,
            overlap_characters: 60,
        };
        let chunker = StatuteChunker::new(config);

        // 오버랩 구간의 첫 공백이 전각 공백(U+3000)인 경우
        let tail = format!(
            "거주자의{}과세표준은종합소득금액에서계산한다",
            '\u{3000}'
        );
        let text = format!(
            "제14조(과세표준)\n{}\n제15조(세율)\n소득세율은 과세표준 구간에 따라 정한다.",
            tail
        );

        let chunks = chunker.chunk(&text);
        assert!(chunks.len() >= 2);
        assert!(chunks[1].starts_with("..."));
    }
}
