//! 프롬프트 모듈 - 고정 프롬프트 템플릿
//!
//! 사전 기반 질문 변경, 히스토리 기반 질문 재구성, 답변 생성에 쓰이는
//! 프롬프트 텍스트와 메시지 목록 구성을 담당합니다. 모든 템플릿은
//! 배포에 고정되어 있으며 런타임에 변경되지 않습니다.

use crate::knowledge::RetrievedChunk;
use crate::llm::ChatMessage;
use crate::session::Turn;

// ============================================================================
// Fixed Prompt Texts
// ============================================================================

/// 질문 변경용 사전 ("패턴 -> 대체어")
///
/// 프롬프트 텍스트에 그대로 삽입되며, 실제 변경 판단은 모델에 위임됩니다.
pub const REWRITE_DICTIONARY: &[&str] = &["사람을 나타내는 표현 -> 거주자"];

/// 히스토리 기반 질문 재구성 시스템 프롬프트
pub const CONTEXTUALIZE_SYSTEM_PROMPT: &str =
    "Given a chat history and the latest user question \
     which might reference context in the chat history, \
     formulate a standalone question which can be understood \
     without the chat history. Do NOT answer the question, \
     just reformulate it if needed and otherwise return it as is.";

/// 답변 생성 시스템 프롬프트 (검색된 문맥이 뒤에 붙음)
pub const QA_SYSTEM_PROMPT: &str = "당신은 소득세법 전문가입니다. 사용자의 소득세법에 관한 질문에 답변해 주세요.\
아래에 제공된 문서를 활용해서 답변해 주시고 \
답변을 알 수 없다면 모른다고 답변해 주세요. \
답변을 제공할 때는 소득세법 (XX조)에 따르면 이라고 시작하면서 답변해 주시고 \
2~3 문장 정도의 짧은 내용의 답변을 원합니다.";

// ============================================================================
// Few-Shot Examples
// ============================================================================

/// 고정 few-shot 예시 (입력, 답변)
#[derive(Debug, Clone)]
pub struct FewShotExample {
    pub input: &'static str,
    pub answer: &'static str,
}

/// 배포에 번들된 답변 스타일 예시
///
/// human/ai 턴 쌍으로 프롬프트에 그대로 삽입됩니다.
pub const ANSWER_EXAMPLES: &[FewShotExample] = &[
    FewShotExample {
        input: "소득세법에서 거주자는 어떤 사람을 의미하나요?",
        answer: "소득세법 (1조의2)에 따르면 거주자는 국내에 주소를 두거나 \
                 183일 이상의 거소를 둔 개인을 말합니다. 거주자 여부에 따라 \
                 과세 범위가 달라집니다.",
    },
    FewShotExample {
        input: "소득세의 과세기간은 어떻게 되나요?",
        answer: "소득세법 (5조)에 따르면 소득세의 과세기간은 1월 1일부터 \
                 12월 31일까지 1년입니다. 거주자가 사망한 경우에는 1월 1일부터 \
                 사망일까지로 합니다.",
    },
    FewShotExample {
        input: "종합소득에는 어떤 소득이 포함되나요?",
        answer: "소득세법 (4조)에 따르면 종합소득은 이자소득, 배당소득, \
                 사업소득, 근로소득, 연금소득, 기타소득을 합산한 것입니다. \
                 퇴직소득과 양도소득은 별도로 구분하여 과세합니다.",
    },
];

// ============================================================================
// Prompt Builders
// ============================================================================

/// 사전 기반 질문 변경 프롬프트 구성
///
/// 고정 지시문에 사전과 원본 질문을 삽입한 단일 user 메시지를 만듭니다.
pub fn build_rewrite_messages(question: &str) -> Vec<ChatMessage> {
    let dictionary = REWRITE_DICTIONARY.join(", ");

    let prompt = format!(
        "사용자의 질문을 보고, 우리의 사전을 참고해서 사용자의 질문을 변경해 주세요.\n\
         만약 변경할 필요가 없다고 판단된다면, 사용자의 질문을 변경하지 않아도 됩니다.\n\
         그런 경우에는 질문만 리턴해 주세요.\n\
         사전: [{}]\n\
         질문: {}",
        dictionary, question
    );

    vec![ChatMessage::user(prompt)]
}

/// 히스토리 기반 질문 재구성 메시지 목록 구성
///
/// 시스템 지시문 + 전체 히스토리 + 최신 질문 순서입니다.
/// 히스토리가 비어 있어도 동일하게 구성됩니다.
pub fn build_contextualize_messages(history: &[Turn], question: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);

    messages.push(ChatMessage::system(CONTEXTUALIZE_SYSTEM_PROMPT));

    for turn in history {
        messages.push(ChatMessage::user(turn.user.clone()));
        messages.push(ChatMessage::assistant(turn.assistant.clone()));
    }

    messages.push(ChatMessage::user(question));
    messages
}

/// 답변 생성 메시지 목록 구성
///
/// 순서: 시스템 지시문(+검색 문맥) → few-shot 예시 → 히스토리 → 질문.
/// 검색 결과가 비어 있어도 "모른다고 답변" 지시문은 항상 포함됩니다.
pub fn build_answer_messages(
    context: &[RetrievedChunk],
    history: &[Turn],
    examples: &[FewShotExample],
    question: &str,
) -> Vec<ChatMessage> {
    let context_text = context
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let system = format!("{}\n\n{}", QA_SYSTEM_PROMPT, context_text);

    let mut messages = Vec::with_capacity(examples.len() * 2 + history.len() * 2 + 2);

    messages.push(ChatMessage::system(system));

    // few-shot 예시를 human/ai 턴 쌍으로 삽입
    for example in examples {
        messages.push(ChatMessage::user(example.input));
        messages.push(ChatMessage::assistant(example.answer));
    }

    for turn in history {
        messages.push(ChatMessage::user(turn.user.clone()));
        messages.push(ChatMessage::assistant(turn.assistant.clone()));
    }

    messages.push(ChatMessage::user(question));
    messages
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            source: "소득세법.txt".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            similarity: 0.9,
        }
    }

    #[test]
    fn test_rewrite_messages_embed_dictionary_and_question() {
        let messages = build_rewrite_messages("연봉 5천만원인 사람의 세금은?");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[0].content.contains("사람을 나타내는 표현 -> 거주자"));
        assert!(messages[0].content.contains("연봉 5천만원인 사람의 세금은?"));
    }

    #[test]
    fn test_contextualize_messages_with_empty_history() {
        let messages = build_contextualize_messages(&[], "그 세율은 얼마인가요?");

        // 히스토리가 비어도 시스템 + 질문으로 구성
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Do NOT answer"));
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_contextualize_messages_include_full_history() {
        let history = vec![
            Turn::new("소득세율이 얼마인가요?", "소득세법 (55조)에 따르면..."),
            Turn::new("과세기간은요?", "소득세법 (5조)에 따르면..."),
        ];
        let messages = build_contextualize_messages(&history, "그럼 공제는요?");

        assert_eq!(messages.len(), 6);
        assert_eq!(messages[1].content, "소득세율이 얼마인가요?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[5].content, "그럼 공제는요?");
    }

    #[test]
    fn test_answer_messages_order() {
        let context = vec![chunk("소득세율은 15%이다")];
        let history = vec![Turn::new("이전 질문", "이전 답변")];

        let messages =
            build_answer_messages(&context, &history, ANSWER_EXAMPLES, "소득세율이 얼마인가요?");

        // 시스템(1) + 예시(3*2) + 히스토리(1*2) + 질문(1)
        assert_eq!(messages.len(), 10);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("소득세율은 15%이다"));

        // few-shot 쌍이 human/ai로 번갈아 나옴
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].role, Role::Assistant);

        // 질문이 마지막
        let last = messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "소득세율이 얼마인가요?");
    }

    #[test]
    fn test_answer_messages_empty_context_keeps_decline_instruction() {
        let messages = build_answer_messages(&[], &[], &[], "모르는 질문");

        // 검색 결과가 없어도 "모른다" 지시문은 유지
        assert!(messages[0].content.contains("모른다고 답변"));
        assert!(messages[0].content.contains("소득세법 (XX조)에 따르면"));
    }

    #[test]
    fn test_answer_examples_start_with_citation() {
        for example in ANSWER_EXAMPLES {
            assert!(example.answer.starts_with("소득세법 ("));
        }
    }
}
