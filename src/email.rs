//! Notification emails for classified warnings.
//!
//! Template choice is a pure function of the program family and the tier;
//! rendering only fills the chosen template with the warning's figures.
//! Nothing here sends mail: the output is a subject/body pair and a Gmail
//! compose link the tutor opens by hand.

use url::form_urlencoded;

use crate::models::{format_hours, ProgramId, Tier, WarningRecord};

const GMAIL_COMPOSE_URL: &str = "https://mail.google.com/mail/";
const MODULE_PLACEHOLDER: &str = "{module}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramFamily {
    Eso,
    Batxillerat,
    Pfi,
    Vocational,
}

impl ProgramFamily {
    pub fn of(program: &ProgramId) -> Self {
        let id = program.as_str();
        if id == "3 ESO" || id == "4 ESO" {
            ProgramFamily::Eso
        } else if id.contains("BATX") {
            ProgramFamily::Batxillerat
        } else if id.contains("PFI") {
            ProgramFamily::Pfi
        } else {
            ProgramFamily::Vocational
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    EsoFollowUp,
    EsoAbsenteeism,
    BatxPreventive,
    BatxAssessmentLoss,
    PfiPreventive,
    PfiFirstSittingLoss,
    VocationalPreventive,
    VocationalFirstSittingLoss,
}

pub fn template_for(family: ProgramFamily, tier: Tier) -> Option<TemplateId> {
    let template = match (family, tier) {
        (_, Tier::None) => return None,
        (ProgramFamily::Eso, Tier::Tier15) => TemplateId::EsoFollowUp,
        (ProgramFamily::Eso, Tier::Tier25) => TemplateId::EsoAbsenteeism,
        (ProgramFamily::Batxillerat, Tier::Tier15) => TemplateId::BatxPreventive,
        (ProgramFamily::Batxillerat, Tier::Tier25) => TemplateId::BatxAssessmentLoss,
        (ProgramFamily::Pfi, Tier::Tier15) => TemplateId::PfiPreventive,
        (ProgramFamily::Pfi, Tier::Tier25) => TemplateId::PfiFirstSittingLoss,
        (ProgramFamily::Vocational, Tier::Tier15) => TemplateId::VocationalPreventive,
        (ProgramFamily::Vocational, Tier::Tier25) => TemplateId::VocationalFirstSittingLoss,
    };
    Some(template)
}

struct Template {
    subject: &'static str,
    opening: &'static str,
    closing: &'static str,
}

impl TemplateId {
    fn template(self) -> Template {
        match self {
            TemplateId::EsoFollowUp => Template {
                subject: "Avís de seguiment d'assistència (15%) - Còmput Global",
                opening: "Us informem que l'alumne ha assolit un 15% de faltes d'assistència en el còmput global del curs.",
                closing: "Aquesta etapa educativa és obligatòria i l'assistència és fonamental per al seguiment del curs. Us recomanem revisar la situació per evitar superar els límits que activarien mètodes de seguiment més estrictes.",
            },
            TemplateId::EsoAbsenteeism => Template {
                subject: "Avís important d'absentisme escolar (25%) - Còmput Global",
                opening: "Us informem que l'alumne ha superat el 25% de faltes d'assistència en el còmput global del curs, el màxim permès.",
                closing: "Recordem que l'Ensenyament Secundari Obligatori (ESO) requereix una assistència continuada. La reiteració en les faltes d'assistència sense justificar pot derivar en l'activació del protocol d'absentisme escolar, la qual cosa podria comportar la intervenció dels serveis socials o educatius competents per garantir el dret a l'escolaritat.\n\nUs preguem que justifiqueu les absències pendents i assegureu l'assistència regular a partir d'ara.",
            },
            TemplateId::BatxPreventive => Template {
                subject: "Avís per faltes d'assistència (15%) - Còmput Global",
                opening: "Us informem que l'alumne ha assolit un 15% de faltes d'assistència en el còmput global del curs.",
                closing: "L'assistència a classe és fonamental per al seguiment del curs. Recordem que superar el 25% de faltes implica la pèrdua del dret a l'avaluació contínua de la primera avaluació.\n\nUs preguem que reviseu la situació.",
            },
            TemplateId::BatxAssessmentLoss => Template {
                subject: "Comunicació pèrdua dret a l'avaluació contínua (1a avaluació) - Còmput Global",
                opening: "Mitjançant la present us comuniquem que l'alumne ha superat el 25% de faltes d'assistència en el còmput global del curs, el màxim permès.",
                closing: "Això implica la pèrdua del dret a l'avaluació contínua de la primera avaluació de totes les matèries.\n\nPodràs recuperar l'avaluació segons els mecanismes de recuperació establerts pel departament corresponent. Per a qualsevol aclariment, pots adreçar-te al professorat de la matèria o al tutor/a.",
            },
            TemplateId::PfiPreventive => Template {
                subject: "Avís per faltes d'assistència (15%) - Còmput Global",
                opening: "Segons el registre d'assistència del centre, has assolit un 15% de faltes d'assistència en el còmput global del curs.",
                closing: "Et recordem que superar el 25% de faltes implica la pèrdua del dret a l'avaluació en 1a convocatòria.\n\nEt demanem que revisis la teva situació i milloris l'assistència. Si ho consideres oportú, posa't en contacte amb el tutor/a.",
            },
            TemplateId::PfiFirstSittingLoss => Template {
                subject: "Comunicació pèrdua dret a 1a convocatòria per faltes (25%) - Còmput Global",
                opening: "Segons el registre d'assistència del centre, has superat el 25% de faltes d'assistència en el còmput global del curs, el màxim permès.",
                closing: "D'acord amb la normativa vigent, això implica la pèrdua del dret a l'avaluació en 1a convocatòria.\n\nPodràs acollir-te a la 2a convocatòria en les condicions que fixa la normativa del centre. Per a qualsevol aclariment, pots adreçar-te al/la tutor/a.",
            },
            TemplateId::VocationalPreventive => Template {
                subject: "Avís per faltes d'assistència (primer avís) - {module}",
                opening: "Segons el registre d'assistència del centre, has assolit un 15% de faltes d'assistència al mòdul {module}.",
                closing: "Et recordem que, d'acord amb el Reial decret 659/2023, superar el 25% de faltes implica la pèrdua del dret a l'avaluació en 1a convocatòria.\n\nEt demanem que revisis la teva situació i milloris l'assistència. Si ho consideres oportú, posa't en contacte amb el professorat o el tutor/a.",
            },
            TemplateId::VocationalFirstSittingLoss => Template {
                subject: "Comunicació pèrdua dret a 1a convocatòria per faltes (25%)",
                opening: "Segons el registre d'assistència del centre, has superat el 25% de faltes d'assistència al mòdul {module}, el màxim permès.",
                closing: "D'acord amb el que estableix el Reial decret 659/2023, de 18 de juliol, pel qual es desenvolupa l'ordenació del Sistema de Formació Professional, això implica la pèrdua del dret a l'avaluació en 1a convocatòria d'aquest mòdul.\n\nPodràs acollir-te a la 2a convocatòria en les condicions que fixa la programació del mòdul i la normativa del centre. Per a qualsevol aclariment o per resoldre dubtes, pots adreçar-te al professorat del mòdul, al/la tutor/a o al cap d'estudis.",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

pub fn compose(warning: &WarningRecord) -> Option<Email> {
    let template = template_for(ProgramFamily::of(&warning.program), warning.tier)?.template();
    let fill = |text: &str| text.replace(MODULE_PLACEHOLDER, &warning.subject);

    let body = format!(
        "Benvolgut/da,\n\n\
         Alumne: {student}\n\
         Grup: {group}\n\n\
         {opening}\n\n\
         RESUM DE LA SITUACIÓ ACTUAL:\n\
         - Hores Faltes Reals: {absence} h\n\
         - Hores Retards: {delay} h\n\
         - Percentatge Actual: {percentage}\n\n\
         {closing}\n\n\
         Atentament,\n\n\
         Equip docent",
        student = warning.student,
        group = warning.group,
        opening = fill(template.opening),
        absence = format_hours(warning.absence_hours),
        delay = format_hours(warning.delay_hours),
        percentage = warning.percentage_label(),
        closing = fill(template.closing),
    );

    Some(Email {
        subject: fill(template.subject),
        body,
    })
}

pub fn gmail_compose_link(email: &Email) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("view", "cm")
        .append_pair("fs", "1")
        .append_pair("su", &email.subject)
        .append_pair("body", &email.body)
        .finish();
    format!("{GMAIL_COMPOSE_URL}?{query}")
}
